use fsig_core::algorithm::HashAlgorithm;
use fsig_core::hashing::{compute_digest, DEFAULT_CHUNK_SIZE};
use fsig_core::SignatureError;
use proptest::prelude::*;
use std::fs;

#[test]
fn known_digests_of_hello() {
    let td = tempfile::tempdir().unwrap();
    let p = td.path().join("a.txt");
    fs::write(&p, b"hello").unwrap();

    let cases = [
        (HashAlgorithm::Md5, "5d41402abc4b2a76b9719d911017c592"),
        (HashAlgorithm::Sha1, "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"),
        (
            HashAlgorithm::Sha256,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
        ),
    ];
    for (alg, want) in cases {
        assert_eq!(compute_digest(&p, alg, DEFAULT_CHUNK_SIZE).unwrap(), want, "{alg}");
    }
}

#[test]
fn every_algorithm_renders_lowercase_hex_of_expected_length() {
    let td = tempfile::tempdir().unwrap();
    let p = td.path().join("data.bin");
    fastrand::seed(0x5EED);
    let data: Vec<u8> = (0..10_000).map(|_| fastrand::u8(..)).collect();
    fs::write(&p, &data).unwrap();

    for alg in HashAlgorithm::ALL {
        let d = compute_digest(&p, alg, 512).unwrap();
        assert_eq!(d.len(), alg.hex_len(), "{alg}");
        assert!(d.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)), "{d}");
    }
}

#[test]
fn distinct_content_gives_distinct_digests() {
    let td = tempfile::tempdir().unwrap();
    let a = td.path().join("file_1.txt");
    let b = td.path().join("file_2.txt");
    fs::write(&a, b"first file\n").unwrap();
    fs::write(&b, b"second file\n").unwrap();
    for alg in HashAlgorithm::ALL {
        assert_ne!(
            compute_digest(&a, alg, 4096).unwrap(),
            compute_digest(&b, alg, 4096).unwrap(),
            "{alg}"
        );
    }
}

#[test]
fn empty_file_digest() {
    let td = tempfile::tempdir().unwrap();
    let p = td.path().join("empty");
    fs::write(&p, b"").unwrap();
    assert_eq!(
        compute_digest(&p, HashAlgorithm::Md5, 8).unwrap(),
        "d41d8cd98f00b204e9800998ecf8427e"
    );
}

#[test]
fn rejects_missing_files_directories_and_zero_chunks() {
    let td = tempfile::tempdir().unwrap();
    let missing = td.path().join("gone.bin");
    assert!(matches!(
        compute_digest(&missing, HashAlgorithm::Sha256, 64),
        Err(SignatureError::PathNotFound(_))
    ));
    assert!(matches!(
        compute_digest(td.path(), HashAlgorithm::Sha256, 64),
        Err(SignatureError::NotAFile(_))
    ));

    let p = td.path().join("x");
    fs::write(&p, b"x").unwrap();
    assert!(matches!(
        compute_digest(&p, HashAlgorithm::Sha256, 0),
        Err(SignatureError::InvalidChunkSize)
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn digest_is_independent_of_chunk_size(
        data in proptest::collection::vec(any::<u8>(), 0..20_000),
        c1 in 1usize..5000,
        c2 in 1usize..5000,
        idx in 0usize..6,
    ) {
        let alg = HashAlgorithm::ALL[idx];
        let td = tempfile::tempdir().unwrap();
        let p = td.path().join("blob");
        fs::write(&p, &data).unwrap();
        let a = compute_digest(&p, alg, c1).unwrap();
        let b = compute_digest(&p, alg, c2).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn digest_is_deterministic(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let td = tempfile::tempdir().unwrap();
        let p = td.path().join("blob");
        fs::write(&p, &data).unwrap();
        let first = compute_digest(&p, HashAlgorithm::Sha512, 128).unwrap();
        let second = compute_digest(&p, HashAlgorithm::Sha512, 128).unwrap();
        prop_assert_eq!(first, second);
    }
}
