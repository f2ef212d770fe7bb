use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::tags::{EmbeddedArtwork, TagReader, TrackTags};
use bridge_traits::SystemClock;
use bytes::Bytes;
use core_backup::RetentionManager;
use core_library::{ArtworkCache, MetadataIndexer, MetadataMap, MetadataStore, TrackRecord};
use mockall::mock;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

mock! {
    Reader {}

    #[async_trait]
    impl TagReader for Reader {
        async fn read_tags(&self, path: &Path) -> BridgeResult<TrackTags>;
    }
}

struct Fixture {
    _dir: TempDir,
    music: PathBuf,
    cache_root: PathBuf,
    backups: PathBuf,
    store: Arc<MetadataStore>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let music = dir.path().join("music");
        let cache_root = dir.path().join("local");
        let backups = dir.path().join("backups");
        std::fs::create_dir_all(&music).unwrap();
        let store = Arc::new(MetadataStore::new(dir.path().join("metadata.json")));
        Self {
            _dir: dir,
            music,
            cache_root,
            backups,
            store,
        }
    }

    fn touch(&self, name: &str) -> String {
        let path = self.music.join(name);
        std::fs::write(&path, b"audio").unwrap();
        path.to_string_lossy().into_owned()
    }

    fn indexer(&self, reader: MockReader) -> MetadataIndexer {
        let retention = Arc::new(RetentionManager::new(
            &self.backups,
            Arc::new(SystemClock),
        ));
        MetadataIndexer::new(
            Arc::clone(&self.store),
            Arc::new(reader),
            ArtworkCache::new(&self.cache_root),
            retention,
        )
        .with_extensions(vec!["mp3".to_string()])
    }
}

fn tagged(title: &str) -> TrackTags {
    TrackTags {
        title: Some(title.to_string()),
        album: Some("Album".to_string()),
        ..Default::default()
    }
}

fn png_cover() -> Bytes {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        4,
        4,
        image::Rgb([200, 10, 10]),
    ));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .unwrap();
    Bytes::from(buffer)
}

#[tokio::test]
async fn test_rebuild_adds_new_and_removes_missing() {
    let fx = Fixture::new();
    let a = fx.music.join("a.mp3").to_string_lossy().into_owned();
    let b = fx.touch("b.mp3");
    let c = fx.touch("c.mp3");

    let artwork = ArtworkCache::new(&fx.cache_root);
    let a_artwork = artwork.store("a", png_cover()).await.unwrap();

    let mut seeded = MetadataMap::new();
    seeded.insert(
        a.clone(),
        TrackRecord {
            title: "A".to_string(),
            artwork: a_artwork.clone(),
            ..Default::default()
        },
    );
    seeded.insert(
        b.clone(),
        TrackRecord {
            title: "B".to_string(),
            ..Default::default()
        },
    );
    fx.store.save(&seeded).await.unwrap();

    let mut reader = MockReader::new();
    reader
        .expect_read_tags()
        .withf(|path: &Path| path.ends_with("c.mp3"))
        .times(1)
        .returning(|_| Ok(tagged("Song C")));

    let summary = fx.indexer(reader).rebuild(&fx.music).await.unwrap();
    assert_eq!(summary.new_count, 1);
    assert_eq!(summary.removed_count, 1);
    assert_eq!(summary.total, 2);
    assert!(!summary.cancelled);

    let stored = fx.store.load().await.unwrap();
    assert!(!stored.contains_key(&a));
    assert_eq!(stored[&b].title, "B");
    assert_eq!(stored[&c].title, "Song C");
    assert!(!artwork.exists(&a_artwork).await);

    let backups: Vec<String> = std::fs::read_dir(&fx.backups)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(backups.len(), 1);
    assert!(backups[0].starts_with("metadata_backup_"));
    assert!(backups[0].ends_with(".json"));
}

#[tokio::test]
async fn test_second_rebuild_is_a_no_op() {
    let fx = Fixture::new();
    fx.touch("one.mp3");
    fx.touch("two.mp3");

    let mut reader = MockReader::new();
    reader
        .expect_read_tags()
        .times(2)
        .returning(|path| Ok(tagged(&path.file_stem().unwrap().to_string_lossy())));
    let indexer = fx.indexer(reader);

    let first = indexer.rebuild(&fx.music).await.unwrap();
    assert_eq!((first.new_count, first.total), (2, 2));
    let after_first = fx.store.load().await.unwrap();

    let second = indexer.rebuild(&fx.music).await.unwrap();
    assert_eq!((second.new_count, second.removed_count, second.total), (0, 0, 2));
    assert_eq!(fx.store.load().await.unwrap(), after_first);
}

#[tokio::test]
async fn test_dotted_root_reuses_existing_records() {
    let fx = Fixture::new();
    fx.touch("one.mp3");
    fx.touch("two.mp3");

    let mut reader = MockReader::new();
    reader
        .expect_read_tags()
        .times(2)
        .returning(|path| Ok(tagged(&path.file_stem().unwrap().to_string_lossy())));
    let indexer = fx.indexer(reader);

    indexer.rebuild(&fx.music).await.unwrap();
    let after_first = fx.store.load().await.unwrap();

    let dotted = fx.music.join("..").join(".").join("music");
    let second = indexer.rebuild(&dotted).await.unwrap();
    assert_eq!((second.new_count, second.removed_count, second.total), (0, 0, 2));

    let records = fx.store.load().await.unwrap();
    assert_eq!(records, after_first);
    for key in records.keys() {
        assert!(!key.contains(".."), "{key} kept a parent segment");
    }
}

#[tokio::test]
async fn test_unreadable_file_gets_stem_record() {
    let fx = Fixture::new();
    let broken = fx.touch("Broken Track.mp3");

    let mut reader = MockReader::new();
    reader.expect_read_tags().times(1).returning(|path| {
        Err(BridgeError::Unreadable {
            path: path.display().to_string(),
            reason: "no frames".to_string(),
        })
    });

    let summary = fx.indexer(reader).rebuild(&fx.music).await.unwrap();
    assert_eq!(summary.unreadable_count, 1);
    assert_eq!(summary.new_count, 1);

    let stored = fx.store.load().await.unwrap();
    assert_eq!(stored[&broken], TrackRecord::stem_only(Path::new(&broken)));
}

#[tokio::test]
async fn test_embedded_artwork_is_cached() {
    let fx = Fixture::new();
    let path = fx.touch("cover.mp3");

    let mut reader = MockReader::new();
    reader.expect_read_tags().times(1).returning(|_| {
        Ok(TrackTags {
            artwork: Some(EmbeddedArtwork {
                data: png_cover(),
                mime_type: Some("image/png".to_string()),
            }),
            ..Default::default()
        })
    });

    fx.indexer(reader).rebuild(&fx.music).await.unwrap();

    let record = &fx.store.load().await.unwrap()[&path];
    assert_eq!(record.title, "cover");
    assert_eq!(record.artwork, "cache/artwork/cover.jpg");
    assert!(fx.cache_root.join("cache").join("artwork").join("cover.jpg").exists());
}

#[tokio::test]
async fn test_cancelled_rebuild_still_prunes() {
    let fx = Fixture::new();
    fx.touch("new.mp3");
    let gone = fx.music.join("gone.mp3").to_string_lossy().into_owned();

    let mut seeded = MetadataMap::new();
    seeded.insert(gone.clone(), TrackRecord::default());
    fx.store.save(&seeded).await.unwrap();

    let mut reader = MockReader::new();
    reader.expect_read_tags().times(0);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let summary = fx
        .indexer(reader)
        .rebuild_with_cancel(&fx.music, &cancel)
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.new_count, 0);
    assert_eq!(summary.removed_count, 1);
    assert!(fx.store.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_root_leaves_store_alone() {
    let fx = Fixture::new();
    let mut seeded = MetadataMap::new();
    seeded.insert("/somewhere/x.mp3".to_string(), TrackRecord::default());
    fx.store.save(&seeded).await.unwrap();

    let reader = MockReader::new();
    let result = fx
        .indexer(reader)
        .rebuild(&fx.music.join("unplugged"))
        .await;

    assert!(result.is_err());
    assert_eq!(fx.store.load().await.unwrap(), seeded);
}

#[tokio::test]
async fn test_corrupt_store_rebuilds_from_scratch() {
    let fx = Fixture::new();
    fx.touch("a.mp3");
    std::fs::write(fx.store.path(), b"{{{{").unwrap();

    let mut reader = MockReader::new();
    reader
        .expect_read_tags()
        .times(1)
        .returning(|_| Ok(tagged("A")));

    let summary = fx.indexer(reader).rebuild(&fx.music).await.unwrap();
    assert_eq!((summary.new_count, summary.total), (1, 1));
}
