use std::fs;
use std::path::Path;

use quorum_core::model::{Chain, SourceUnit};
use quorum_core::project::QuorumLayout;
use quorum_core::services::checks::{similarity, DiffCheck, LocalTree, ProposalScope, ReviewDiffCheck};
use tempfile::tempdir;

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, body).expect("write");
}

fn patch_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read run dir")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".patch"))
        .collect();
    names.sort();
    names
}

#[test]
fn nested_local_file_is_matched_and_diffed() {
    let tmp = tempdir().expect("tempdir");
    let layout = QuorumLayout::new(tmp.path());
    let modules = layout.modules_dir("Aave");
    write(&modules, "repo/contracts/v2/src/Foo.sol", "contract Foo {\n    uint256 a;\n}\n");

    let scope = ProposalScope::new(&layout, "Aave", Chain::Ethereum, "0xabc");
    let check = DiffCheck::new(&scope).expect("diff check");
    let remote = SourceUnit::from_text("src/Foo.sol", "contract Foo {\n    uint256 b;\n}\n");
    let missing = SourceUnit::from_text("src/Nowhere.sol", "contract Nowhere {}");

    let result = check.find_diffs(&[remote, missing]).expect("find diffs");

    assert_eq!(result.matched_pairs.len(), 1);
    assert_eq!(result.matched_pairs[0].local_path, "repo/contracts/v2/src/Foo.sol");
    assert_eq!(result.missing_files.len(), 1);
    assert_eq!(result.missing_files[0].path(), "src/Nowhere.sol");
    assert_eq!(result.diffed_files.len(), 1);
    assert!(result.diffed_files[0].diff.contains("-    uint256 a;"));
    assert!(result.diffed_files[0].diff.contains("+    uint256 b;"));

    assert_eq!(patch_files(&check.run.output_dir), vec!["Foo.patch".to_string()]);
    let written = fs::read_to_string(check.run.output_dir.join("Foo.patch")).expect("patch");
    assert!(written.contains("+    uint256 b;"));
}

#[test]
fn identical_files_produce_no_artifact() {
    let tmp = tempdir().expect("tempdir");
    let layout = QuorumLayout::new(tmp.path());
    write(&layout.modules_dir("Aave"), "repo/src/Same.sol", "line one\nline two\n");

    let scope = ProposalScope::new(&layout, "Aave", Chain::Ethereum, "0xabc");
    let check = DiffCheck::new(&scope).expect("diff check");
    let result = check
        .find_diffs(&[SourceUnit::from_text("src/Same.sol", "line one\nline two")])
        .expect("find diffs");

    assert_eq!(result.matched_pairs.len(), 1);
    assert!(result.diffed_files.is_empty());
    assert!(patch_files(&check.run.output_dir).is_empty());
    let summary = result.summary();
    assert_eq!((summary.identical, summary.diffed, summary.missing), (1, 0, 0));
}

#[test]
fn every_remote_file_is_matched_or_missing() {
    let tmp = tempdir().expect("tempdir");
    let layout = QuorumLayout::new(tmp.path());
    let modules = layout.modules_dir("Aave");
    write(&modules, "a/src/One.sol", "one");
    write(&modules, "b/lib/Two.sol", "two");

    let units = vec![
        SourceUnit::from_text("src/One.sol", "one"),
        SourceUnit::from_text("@lib/Two.sol", "changed"),
        SourceUnit::from_text("Three.sol", "three"),
        SourceUnit::from_text("deep/path/One.sol", "one"),
    ];
    let scope = ProposalScope::new(&layout, "Aave", Chain::Ethereum, "0xabc");
    let result = DiffCheck::new(&scope).expect("diff check").find_diffs(&units).expect("find diffs");

    assert_eq!(result.matched_pairs.len() + result.missing_files.len(), units.len());
    assert_eq!(result.missing_files.len(), 1);
}

#[test]
fn reconciliation_is_deterministic() {
    let tmp = tempdir().expect("tempdir");
    let layout = QuorumLayout::new(tmp.path());
    let modules = layout.modules_dir("Aave");
    write(&modules, "x/src/Foo.sol", "x");
    write(&modules, "y/src/Foo.sol", "y");
    write(&modules, "z/other/Foo.sol", "z");

    let units = vec![SourceUnit::from_text("src/Foo.sol", "remote")];
    let scope = ProposalScope::new(&layout, "Aave", Chain::Ethereum, "0xabc");

    let first = DiffCheck::new(&scope).expect("first").find_diffs(&units).expect("first run");
    let second = DiffCheck::new(&scope).expect("second").find_diffs(&units).expect("second run");

    assert_eq!(first.matched_pairs, second.matched_pairs);
    assert_eq!(first.diffed_files, second.diffed_files);
    // Equal similarity: the first candidate in sorted order wins.
    assert_eq!(first.matched_pairs[0].local_path, "x/src/Foo.sol");
}

#[test]
fn longest_suffix_beats_similarity_of_shorter_suffixes() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    write(root, "Foo.sol", "top level");
    write(root, "pkg/v3/core/Foo.sol", "nested");

    let tree = LocalTree::scan(root);
    assert_eq!(tree.best_match("v3/core/Foo.sol"), Some("pkg/v3/core/Foo.sol"));
    assert_eq!(tree.best_match("Foo.sol"), Some("Foo.sol"));
    assert_eq!(tree.best_match("Bar.sol"), None);
}

#[test]
fn git_metadata_is_not_indexed() {
    let tmp = tempdir().expect("tempdir");
    write(tmp.path(), ".git/config", "[core]");
    write(tmp.path(), "src/A.sol", "a");
    let tree = LocalTree::scan(tmp.path());
    assert_eq!(tree.files(), &["src/A.sol".to_string()]);
}

#[test]
fn similarity_is_normalized() {
    assert!((similarity("src/Foo.sol", "src/Foo.sol") - 1.0).abs() < f32::EPSILON);
    assert!(similarity("src/Foo.sol", "lib/zzz/Foo.sol") < 1.0);
}

#[test]
fn review_diff_uses_review_tree() {
    let tmp = tempdir().expect("tempdir");
    let layout = QuorumLayout::new(tmp.path());
    write(&layout.review_dir("Aave"), "proposals/src/NewPayload.sol", "contract NewPayload {}");

    let scope = ProposalScope::new(&layout, "Aave", Chain::Arbitrum, "0xabc");
    let review = ReviewDiffCheck::new(&scope).expect("review check");
    let result = review
        .find_diffs(&[SourceUnit::from_text("src/NewPayload.sol", "contract NewPayload {}")])
        .expect("find diffs");

    assert_eq!(result.matched_pairs.len(), 1);
    assert!(result.missing_files.is_empty());
    assert!(review.run().output_dir.starts_with(layout.proposal_checks_dir("Aave", "Arbitrum", "0xabc")));
    assert!(review
        .run()
        .output_dir
        .file_name()
        .expect("name")
        .to_string_lossy()
        .starts_with("ReviewDiffCheck_"));
}

#[test]
fn missing_local_tree_reports_everything_missing() {
    let tmp = tempdir().expect("tempdir");
    let layout = QuorumLayout::new(tmp.path());
    let scope = ProposalScope::new(&layout, "Nobody", Chain::Ethereum, "0xabc");
    let result = DiffCheck::new(&scope)
        .expect("diff check")
        .find_diffs(&[SourceUnit::from_text("A.sol", "a")])
        .expect("find diffs");
    assert_eq!(result.missing_files.len(), 1);
    assert!(result.matched_pairs.is_empty());
}
