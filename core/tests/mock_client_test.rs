use async_trait::async_trait;
use mockall::mock;
use mockall::predicate::function;
use narrator_core::{
    ItemStatus, ProductionConfig, ProductionOrchestrator, RunRequest, SpeechClient, SpeechError,
    SpeechRequest, VoiceName,
};
use std::sync::Arc;

mock! {
    pub Client {}

    #[async_trait]
    impl SpeechClient for Client {
        async fn synthesize(&self, request: SpeechRequest) -> Result<Vec<u8>, SpeechError>;
    }
}

#[tokio::test(start_paused = true)]
async fn test_blocked_segment_called_once() {
    let mut client = MockClient::new();
    client
        .expect_synthesize()
        .with(function(|r: &SpeechRequest| r.text == "Forbidden words."))
        .times(1)
        .returning(|_| Err(SpeechError::SafetyBlocked("finishReason SAFETY".into())));
    client
        .expect_synthesize()
        .with(function(|r: &SpeechRequest| r.text == "Kind words."))
        .times(1)
        .returning(|_| Ok(vec![0u8; 96]));

    let orch = ProductionOrchestrator::new(Arc::new(client), ProductionConfig::default());
    let report = orch
        .start_run(
            RunRequest::new("Forbidden words.\nKind words.", 1).with_voice(VoiceName::Charon),
        )
        .await
        .unwrap();

    assert_eq!((report.completed, report.failed), (1, 1));
    let items = orch.items().await;
    assert_eq!(items[0].status, ItemStatus::Error);
    assert!(items[0].error.as_deref().unwrap().contains("SAFETY"));
    assert_eq!(items[1].status, ItemStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_voice_and_style_forwarded() {
    let mut client = MockClient::new();
    client
        .expect_synthesize()
        .withf(|r| r.voice == VoiceName::Fenrir && r.style.as_deref() == Some("deep and slow"))
        .times(2)
        .returning(|_| Ok(vec![0u8; 96]));

    let orch = ProductionOrchestrator::new(Arc::new(client), ProductionConfig::default());
    let report = orch
        .start_run(
            RunRequest::new("a\nb", 1)
                .with_voice(VoiceName::Fenrir)
                .with_style("deep and slow")
                .with_pacing(0),
        )
        .await
        .unwrap();
    assert_eq!(report.completed, 2);
}
