//! Hash domain lock: every hash in the system is prefixed by one of a fixed
//! set of domain separators, and no crate spells a separator by hand.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use uli_kernel::proof::hash::{canonical_hash, chained_hash};
use uli_kernel::proof::hash_domain::HashDomain;

const EXPECTED: [&[u8]; 6] = [
    b"ULI::STAIRCASE_POLICY::V1\0",
    b"ULI::STIMULUS_SET::V1\0",
    b"ULI::TRIAL_TAPE::V1\0",
    b"ULI::TRIAL_TAPE_CHAIN::V1\0",
    b"ULI::BUNDLE_ARTIFACT::V1\0",
    b"ULI::BUNDLE_DIGEST::V1\0",
];

#[test]
fn domain_set_is_locked() {
    let actual: Vec<&[u8]> = HashDomain::ALL.iter().map(HashDomain::as_bytes).collect();
    assert_eq!(actual, EXPECTED.to_vec());
}

#[test]
fn domains_are_unique_and_terminated() {
    let unique: BTreeSet<&[u8]> = HashDomain::ALL.iter().map(HashDomain::as_bytes).collect();
    assert_eq!(unique.len(), HashDomain::ALL.len());
    for domain in HashDomain::ALL {
        let bytes = domain.as_bytes();
        assert!(bytes.starts_with(b"ULI::"), "{domain}");
        assert!(bytes.ends_with(b"::V1\0"), "{domain}");
        assert_eq!(bytes.iter().filter(|&&b| b == 0).count(), 1, "{domain}");
    }
}

#[test]
fn canonical_hash_is_prefixed_sha256() {
    for domain in HashDomain::ALL {
        let data = b"{\"level_mdb\":-8000}";
        let mut hasher = Sha256::new();
        hasher.update(domain.as_bytes());
        hasher.update(data);
        let expected = format!("sha256:{}", hex::encode(hasher.finalize()));
        assert_eq!(canonical_hash(*domain, data).as_str(), expected);
    }
}

#[test]
fn chained_hash_covers_previous_link() {
    let prev = canonical_hash(HashDomain::TrialTape, b"header");
    let a = chained_hash(HashDomain::TrialTapeChain, &prev, b"trial");
    let other = canonical_hash(HashDomain::TrialTape, b"other header");
    let b = chained_hash(HashDomain::TrialTapeChain, &other, b"trial");
    assert_ne!(a, b);
}

fn rust_files(dir: &Path, out: &mut Vec<PathBuf>) {
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            rust_files(&path, out);
        } else if path.extension().is_some_and(|e| e == "rs") {
            out.push(path);
        }
    }
}

#[test]
fn no_hand_written_separators() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    let mut files = Vec::new();
    for krate in ["kernel/src", "staircase/src", "harness/src"] {
        rust_files(&root.join(krate), &mut files);
    }
    assert!(!files.is_empty());
    let offenders: Vec<String> = files
        .iter()
        .filter(|p| !p.ends_with("proof/hash_domain.rs"))
        .filter(|p| std::fs::read_to_string(p).unwrap().contains("b\"ULI::"))
        .map(|p| p.display().to_string())
        .collect();
    assert!(offenders.is_empty(), "raw domain literals in {offenders:?}");
}
