use snaphound_indexer::{ContentIndex, IndexConfig};
use tempfile::tempdir;

#[tokio::test]
async fn finds_documents_by_content_and_name() {
    let temp = tempdir().expect("failed to create tempdir");
    let docs = temp.path().join("docs");
    std::fs::create_dir_all(&docs).expect("create docs dir");

    let story = docs.join("story.txt");
    std::fs::write(&story, "and they lived happily until the credits rolled").expect("write story");
    let poster = docs.join("credits_poster.png");
    std::fs::write(&poster, [0u8, 159, 146, 150]).expect("write poster");
    let other = docs.join("shopping.txt");
    std::fs::write(&other, "milk eggs bread").expect("write list");

    let index_dir = temp.path().join("index");
    let index = ContentIndex::open_or_build(IndexConfig {
        index_dir: index_dir.clone(),
        files: vec![story.clone(), poster.clone(), other.clone()],
        max_file_bytes: 1024,
    })
    .await
    .expect("index should build");

    let found = index.search("credits", 10).await.expect("search should succeed");
    assert!(found.contains(&story));
    assert!(found.contains(&poster));
    assert!(!found.contains(&other));

    assert!(index.search("  ", 10).await.expect("blank search").is_empty());
    assert!(index_dir.join("meta.json").exists());
}

#[tokio::test]
async fn rebuilds_when_the_file_set_changes() {
    let temp = tempdir().expect("failed to create tempdir");
    let index_dir = temp.path().join("index");
    let first = temp.path().join("a.txt");
    std::fs::write(&first, "The END").expect("write a");

    let config = |files: Vec<std::path::PathBuf>| IndexConfig {
        index_dir: index_dir.clone(),
        files,
        max_file_bytes: 1024,
    };

    let index = ContentIndex::open_or_build(config(vec![first.clone()]))
        .await
        .expect("index should build");
    assert_eq!(index.search("The END", 10).await.expect("search"), vec![first.clone()]);

    let second = temp.path().join("b.txt");
    std::fs::write(&second, "The END").expect("write b");
    let index = ContentIndex::open_or_build(config(vec![first.clone(), second.clone()]))
        .await
        .expect("index should rebuild");
    let found = index.search("The END", 10).await.expect("search");
    assert_eq!(found.len(), 2);
    assert!(found.contains(&first));
    assert!(found.contains(&second));

    // dropping a file from the set also drops it from the index
    let index = ContentIndex::open_or_build(config(vec![second.clone()]))
        .await
        .expect("index should rebuild");
    assert_eq!(index.search("The END", 10).await.expect("search"), vec![second]);
}
