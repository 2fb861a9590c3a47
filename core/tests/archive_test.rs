use narrator_core::{
    encode_wav, ArchiveBuilder, ArchiveError, AudioClip, BatchGroup, ItemStatus, ProductionItem,
    VoiceName, SAMPLE_RATE,
};
use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::sync::Arc;
use uuid::Uuid;
use zip::ZipArchive;

fn item(seq: usize, text: &str, voice: VoiceName, status: ItemStatus, fill: u8) -> ProductionItem {
    let group = BatchGroup {
        sequence: seq,
        text: text.to_string(),
        char_count: text.chars().count(),
    };
    let mut item = ProductionItem::from_group(Uuid::new_v4(), &group, voice);
    item.status = status;
    if status == ItemStatus::Completed {
        let wav = encode_wav(&vec![fill; 2400], SAMPLE_RATE).unwrap();
        item.audio = Some(AudioClip {
            wav: Arc::from(wav),
            sample_rate: SAMPLE_RATE,
            duration_ms: 50,
        });
    }
    item
}

#[test]
fn test_completed_items_only_with_distinct_names() {
    let items = vec![
        item(1, "Same words here.", VoiceName::Kore, ItemStatus::Completed, 1),
        item(2, "Failed line.", VoiceName::Kore, ItemStatus::Error, 0),
        item(3, "Same words here.", VoiceName::Kore, ItemStatus::Completed, 2),
        item(4, "Still waiting.", VoiceName::Puck, ItemStatus::Pending, 0),
        item(5, "Last one!", VoiceName::Charon, ItemStatus::Completed, 3),
    ];

    let archive = ArchiveBuilder::default().build(&items).unwrap();
    assert_eq!(
        archive.entries,
        vec![
            "01_Kore_same_words_here_.wav",
            "02_Kore_same_words_here_.wav",
            "03_Charon_last_one_.wav",
        ]
    );
    let unique: HashSet<_> = archive.entries.iter().collect();
    assert_eq!(unique.len(), archive.entries.len());

    let mut zip = ZipArchive::new(Cursor::new(archive.bytes.clone())).unwrap();
    assert_eq!(zip.len(), 3);
    let completed: Vec<_> = items.iter().filter(|i| i.is_completed()).collect();
    for (idx, expected) in completed.iter().enumerate() {
        let mut entry = zip.by_index(idx).unwrap();
        assert_eq!(entry.name(), archive.entries[idx]);
        let mut body = Vec::new();
        entry.read_to_end(&mut body).unwrap();
        assert_eq!(body, expected.audio.as_ref().unwrap().bytes());
    }
}

#[test]
fn test_nothing_completed_is_an_error() {
    let items = vec![
        item(1, "a", VoiceName::Kore, ItemStatus::Error, 0),
        item(2, "b", VoiceName::Kore, ItemStatus::Processing, 0),
    ];
    assert!(matches!(
        ArchiveBuilder::default().build(&items),
        Err(ArchiveError::Empty)
    ));
}

#[test]
fn test_stored_entries_and_write_to_disk() {
    let items = vec![item(1, "Stored.", VoiceName::Fenrir, ItemStatus::Completed, 9)];
    let archive = ArchiveBuilder::new(zip::CompressionMethod::Stored)
        .build(&items)
        .unwrap();

    let path = std::env::temp_dir().join(format!("narrator-archive-{}.zip", Uuid::new_v4()));
    archive.write_to(&path).unwrap();
    let on_disk = std::fs::read(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(on_disk, archive.bytes);

    let mut zip = ZipArchive::new(Cursor::new(on_disk)).unwrap();
    let entry = zip.by_index(0).unwrap();
    assert_eq!(entry.compression(), zip::CompressionMethod::Stored);
    assert_eq!(entry.size(), 44 + 2400);
}

#[tokio::test]
async fn test_build_on_blocking_worker() {
    let items = vec![
        item(1, "One.", VoiceName::Zephyr, ItemStatus::Completed, 1),
        item(2, "Two.", VoiceName::Zephyr, ItemStatus::Completed, 2),
    ];
    let archive = ArchiveBuilder::default().build_blocking(items).await.unwrap();
    assert_eq!(archive.entries, vec!["01_Zephyr_one_.wav", "02_Zephyr_two_.wav"]);
}
