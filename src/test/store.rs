use pretty_assertions::assert_eq;

use crate::{
    bson::{oid::ObjectId, DateTime},
    db::{memory::MemoryDatabase, Database},
    error::{ErrorKind, GridFsErrorKind},
    gridfs::{store::ChunkStore, Chunk, FilesCollectionDocument},
    test::FlakyDatabase,
};

fn store() -> ChunkStore {
    ChunkStore::new(&Database::new(MemoryDatabase::new()), "fs")
}

fn file_record(filename: &str, length: u64, millis: i64) -> FilesCollectionDocument {
    FilesCollectionDocument {
        id: ObjectId::new(),
        length,
        chunk_size: 4,
        upload_date: DateTime::from_millis(millis),
        filename: filename.to_string(),
        content_type: "text/plain".to_string(),
        md5: None,
        metadata: None,
    }
}

fn chunk(files_id: ObjectId, n: u32, data: Vec<u8>) -> Chunk {
    Chunk {
        id: ObjectId::new(),
        files_id,
        n,
        data,
    }
}

#[tokio::test]
async fn update_file_length_requires_an_existing_file() {
    let store = store();
    let error = store
        .update_file_length(ObjectId::new(), 12, None)
        .await
        .unwrap_err();
    assert!(error.is_file_not_found());
}

#[tokio::test]
async fn update_file_length_finalizes_length_and_md5() {
    let store = store();
    let file = file_record("a", 0, 1_000);
    store.insert_file(&file).await.unwrap();
    store
        .update_file_length(file.id, 12, Some("abc123".to_string()))
        .await
        .unwrap();
    let reloaded = store.find_file_by_id(file.id).await.unwrap().unwrap();
    assert_eq!(reloaded.length, 12);
    assert_eq!(reloaded.md5.as_deref(), Some("abc123"));
}

#[tokio::test]
async fn find_file_by_name_prefers_the_most_recent_upload() {
    let store = store();
    let older = file_record("report", 4, 1_000);
    let newer = file_record("report", 8, 2_000);
    store.insert_file(&older).await.unwrap();
    store.insert_file(&newer).await.unwrap();

    let found = store.find_file_by_name("report").await.unwrap().unwrap();
    assert_eq!(found.id, newer.id);

    assert!(store.find_file_by_name("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn list_files_orders_by_filename() {
    let store = store();
    for name in ["cherry", "apple", "banana"] {
        store.insert_file(&file_record(name, 0, 1_000)).await.unwrap();
    }
    use futures_util::TryStreamExt;
    let files: Vec<FilesCollectionDocument> = store
        .list_files(crate::bson::doc! {}, crate::bson::doc! { "filename": 1 })
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    let names: Vec<&str> = files.iter().map(|file| file.filename.as_str()).collect();
    assert_eq!(names, vec!["apple", "banana", "cherry"]);
}

#[tokio::test]
async fn load_chunks_ordered_sorts_by_index() {
    let store = store();
    let files_id = ObjectId::new();
    for n in [2u32, 0, 1] {
        store
            .insert_chunks(&[chunk(files_id, n, vec![n as u8; 4])])
            .await
            .unwrap();
    }
    use futures_util::TryStreamExt;
    let chunks: Vec<Chunk> = store
        .load_chunks_ordered(files_id)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    let indices: Vec<u32> = chunks.iter().map(|chunk| chunk.n).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[tokio::test]
async fn chunk_at_is_a_point_lookup() {
    let store = store();
    let files_id = ObjectId::new();
    store
        .insert_chunks(&[
            chunk(files_id, 0, vec![0; 4]),
            chunk(files_id, 1, vec![1; 4]),
        ])
        .await
        .unwrap();

    let found = store.chunk_at(files_id, 1).await.unwrap().unwrap();
    assert_eq!(found.data, vec![1; 4]);
    assert!(store.chunk_at(files_id, 9).await.unwrap().is_none());
    assert!(store.chunk_at(ObjectId::new(), 0).await.unwrap().is_none());
}

#[tokio::test]
async fn partial_bulk_insert_surfaces_the_written_count() {
    let database = Database::new(FlakyDatabase::with_insert_many_budget(1));
    let store = ChunkStore::new(&database, "fs");
    let files_id = ObjectId::new();
    let chunks: Vec<Chunk> = (0..3).map(|n| chunk(files_id, n, vec![0; 4])).collect();

    let error = store.insert_chunks(&chunks).await.unwrap_err();
    match *error.kind {
        ErrorKind::GridFs(GridFsErrorKind::PartialChunkWrite { chunks_written }) => {
            assert_eq!(chunks_written, 1)
        }
        ref other => panic!("expected a partial chunk write error, got {other:?}"),
    }
    let source = error.source.as_ref().unwrap();
    assert!(matches!(
        *source.kind,
        ErrorKind::PartialInsert {
            inserted_count: 1,
            ..
        }
    ));
}

#[tokio::test]
async fn deletes_are_issued_independently() {
    let store = store();
    let file = file_record("a", 8, 1_000);
    store.insert_file(&file).await.unwrap();
    store
        .insert_chunks(&[
            chunk(file.id, 0, vec![0; 4]),
            chunk(file.id, 1, vec![1; 4]),
        ])
        .await
        .unwrap();

    assert_eq!(store.delete_chunks(file.id).await.unwrap(), 2);
    assert_eq!(store.delete_file(file.id).await.unwrap(), 1);
    assert_eq!(store.delete_chunks(file.id).await.unwrap(), 0);
    assert_eq!(store.delete_file(file.id).await.unwrap(), 0);
}
