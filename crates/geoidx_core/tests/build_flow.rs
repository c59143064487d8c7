use geoidx_core::consts::{CLASSIF_FILE_TAG, FEATURES_FILE_TAG, HEADER_FILE_TAG, SEARCH_INDEX_FILE_TAG};
use geoidx_core::{
    build_search_index, build_search_index_for_container, reverse_bytes, BuildError, Classificator,
    ContainerReader, ContainerWriter, DataHeader, Feature, FeaturesVector, FeaturesWriter, IndexConfig,
    IndexEntry, TrieReader,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

fn write_container(path: &Path, features: &[Feature], classif: &Classificator) -> Vec<u32> {
    let mut fw = FeaturesWriter::new();
    let offsets = features.iter().map(|f| fw.add(f).unwrap()).collect();
    let (hdr, dat) = fw.finish();
    let mut w = ContainerWriter::create(path);
    w.put_section(HEADER_FILE_TAG, hdr).unwrap();
    w.put_section(FEATURES_FILE_TAG, dat).unwrap();
    w.put_section(CLASSIF_FILE_TAG, classif.to_bytes().unwrap()).unwrap();
    w.commit().unwrap();
    offsets
}

fn sample(dir: &Path) -> (PathBuf, Vec<u32>) {
    let mut classif = Classificator::default();
    classif.insert(7, "park");
    classif.insert(9, "cafe");
    let features = vec![
        Feature::new(200).with_name(1, "Central Park").with_type(7),
        Feature::new(50).with_name(1, "Park").with_name(2, "Парк"),
        Feature::new(120).with_name(1, "Café Central").with_type(9),
    ];
    let path = dir.join("city.gidx");
    let offsets = write_container(&path, &features, &classif);
    (path, offsets)
}

fn stored_entries(path: &Path) -> Vec<IndexEntry> {
    let r = ContainerReader::open(path).unwrap();
    TrieReader::new(r.section(SEARCH_INDEX_FILE_TAG).unwrap()).entries().unwrap()
}

fn dir_names(dir: &Path) -> Vec<String> {
    let mut v: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    v.sort();
    v
}

#[test]
fn category_and_name_tokens_are_distinct_keys() {
    let dir = tempdir().unwrap();
    let mut classif = Classificator::default();
    classif.insert(7, "park");
    let path = dir.path().join("a.gidx");
    // pad so the feature lands at offset 1024
    let filler = Feature::new(0).with_name(1, "x".repeat(1012));
    let mut fw = FeaturesWriter::new();
    fw.add(&filler).unwrap();
    let off = fw.add(&Feature::new(200).with_name(1, "Central Park").with_type(7)).unwrap();
    assert_eq!(off, 1024);
    let (hdr, dat) = fw.finish();
    let mut w = ContainerWriter::create(&path);
    w.put_section(HEADER_FILE_TAG, hdr).unwrap();
    w.put_section(FEATURES_FILE_TAG, dat).unwrap();
    w.put_section(CLASSIF_FILE_TAG, classif.to_bytes().unwrap()).unwrap();
    w.commit().unwrap();

    build_search_index_for_container(&path, &IndexConfig::default()).unwrap();

    let got: Vec<(u8, String, u8, u32)> = stored_entries(&path)
        .into_iter()
        .filter(|e| e.offset() == 1024)
        .map(|e| (e.lang(), e.token(), e.rank(), e.offset()))
        .collect();
    assert_eq!(
        got,
        vec![
            (0, "park".to_string(), 200, 1024),
            (1, "central".to_string(), 200, 1024),
            (1, "park".to_string(), 200, 1024),
        ]
    );
}

#[test]
fn higher_rank_comes_first_for_same_token() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("b.gidx");
    let offsets = write_container(
        &path,
        &[Feature::new(50).with_name(1, "Park"), Feature::new(200).with_name(1, "Park")],
        &Classificator::default(),
    );
    build_search_index_for_container(&path, &IndexConfig::default()).unwrap();

    let parks: Vec<(u8, u32)> = stored_entries(&path)
        .into_iter()
        .filter(|e| e.lang() == 1 && e.token() == "park")
        .map(|e| (e.rank(), e.offset()))
        .collect();
    assert_eq!(parks, vec![(200, offsets[1]), (50, offsets[0])]);
}

#[test]
fn duplicate_tokens_survive_once() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("d.gidx");
    write_container(&path, &[Feature::new(5).with_name(1, "Park Park park")], &Classificator::default());
    let stats = build_search_index_for_container(&path, &IndexConfig::default()).unwrap();
    assert_eq!(stats.entries, 3);
    assert_eq!(stats.unique_entries, 1);
    assert_eq!(stored_entries(&path).len(), 1);
}

#[test]
fn corrupt_header_is_a_read_failure_and_leaves_file_alone() {
    let dir = tempdir().unwrap();
    let (path, _) = sample(dir.path());
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0..4].copy_from_slice(b"JUNK");
    std::fs::write(&path, &bytes).unwrap();

    let err = build_search_index_for_container(&path, &IndexConfig::default()).unwrap_err();
    assert!(matches!(err, BuildError::Read(_)), "{err}");
    assert_eq!(std::fs::read(&path).unwrap(), bytes);
    assert_eq!(dir_names(dir.path()), vec!["city.gidx".to_string()]);
}

#[test]
fn unwritable_scratch_is_a_write_failure() {
    let dir = tempdir().unwrap();
    let (path, _) = sample(dir.path());
    let before = std::fs::read(&path).unwrap();
    let cfg = IndexConfig { scratch_dir: Some(dir.path().join("missing")), ..IndexConfig::default() };

    let err = build_search_index_for_container(&path, &cfg).unwrap_err();
    assert!(matches!(err, BuildError::Write(_)));
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn rebuild_is_byte_identical_and_cleans_scratch() {
    let dir = tempdir().unwrap();
    let (path, _) = sample(dir.path());
    build_search_index_for_container(&path, &IndexConfig::default()).unwrap();
    let first = std::fs::read(&path).unwrap();
    build_search_index_for_container(&path, &IndexConfig::default()).unwrap();
    let second = std::fs::read(&path).unwrap();
    assert_eq!(first, second);
    assert_eq!(dir_names(dir.path()), vec!["city.gidx".to_string()]);
}

#[test]
fn stored_section_reverses_to_forward_stream() {
    let dir = tempdir().unwrap();
    let (path, _) = sample(dir.path());
    let stats = build_search_index_for_container(&path, &IndexConfig::default()).unwrap();

    let r = ContainerReader::open(&path).unwrap();
    let header = DataHeader::load(r.section(HEADER_FILE_TAG).unwrap()).unwrap();
    let classif = Classificator::load(r.section(CLASSIF_FILE_TAG).unwrap()).unwrap();
    let fv = FeaturesVector::new(r.section(FEATURES_FILE_TAG).unwrap(), header);
    let mut forward = Vec::new();
    build_search_index(&fv, &classif, &IndexConfig::default(), &mut forward).unwrap();

    let stored = r.section(SEARCH_INDEX_FILE_TAG).unwrap();
    assert_eq!(stored.len() as u64, stats.section_len);
    assert_eq!(reverse_bytes(stored), forward);
    assert_eq!(reverse_bytes(&forward), stored);
}

#[test]
fn root_edges_bound_every_rank_below() {
    let dir = tempdir().unwrap();
    let (path, _) = sample(dir.path());
    build_search_index_for_container(&path, &IndexConfig::default()).unwrap();
    let r = ContainerReader::open(&path).unwrap();
    let trie = TrieReader::new(r.section(SEARCH_INDEX_FILE_TAG).unwrap());
    let entries = trie.entries().unwrap();
    for edge in trie.root().unwrap().edges {
        let best = entries
            .iter()
            .filter(|e| e.key().starts_with(&edge.label))
            .map(|e| e.rank())
            .max()
            .unwrap();
        assert_eq!(edge.max_value, best);
    }
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Captured {
    type Writer = Captured;
    fn make_writer(&'a self) -> Self::Writer { self.clone() }
}

#[test]
fn overlong_name_contributes_thirty_entries_and_one_warning() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("long.gidx");
    let name = (0..45).map(|i| format!("tok{i}")).collect::<Vec<_>>().join(" ");
    write_container(&path, &[Feature::new(1).with_name(1, name)], &Classificator::default());

    let cap = Captured::default();
    let sub = tracing_subscriber::fmt().with_writer(cap.clone()).with_ansi(false).finish();
    let stats = tracing::subscriber::with_default(sub, || {
        build_search_index_for_container(&path, &IndexConfig::default()).unwrap()
    });

    assert_eq!(stats.truncated_names, 1);
    assert_eq!(stored_entries(&path).len(), 30);
    let log = String::from_utf8(cap.0.lock().unwrap().clone()).unwrap();
    assert_eq!(log.matches("Name has too many tokens").count(), 1);
}

#[cfg(unix)]
#[test]
fn rebuild_keeps_container_permissions() {
    use std::os::unix::fs::PermissionsExt;
    let dir = tempdir().unwrap();
    let (path, _) = sample(dir.path());
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

    build_search_index_for_container(&path, &IndexConfig::default()).unwrap();
    let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o644);
}
