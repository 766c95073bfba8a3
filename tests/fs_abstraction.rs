// tests/fs_abstraction.rs

use std::path::PathBuf;

use buildwatch::fs::mock::MockFileSystem;
use buildwatch::fs::{clean_outputs, collect_files, FileSystem};

#[test]
fn collect_files_walks_recursively_and_sorts() {
    let fs = MockFileSystem::new();
    fs.add_file("/p/src/app/util.cljs", "");
    fs.add_file("/p/src/app/core.cljs", "");
    fs.add_file("/p/src/app/nested/deep.cljc", "");
    fs.add_file("/p/src/app/style.js", "");

    let files = collect_files(&fs, &PathBuf::from("/p/src"), |p| {
        p.extension().is_some_and(|e| e == "cljs" || e == "cljc")
    })
    .unwrap();

    assert_eq!(
        files,
        vec![
            PathBuf::from("/p/src/app/core.cljs"),
            PathBuf::from("/p/src/app/nested/deep.cljc"),
            PathBuf::from("/p/src/app/util.cljs"),
        ]
    );
}

#[test]
fn collect_files_accepts_a_single_file_root() {
    let fs = MockFileSystem::new();
    fs.add_file("/p/main.cljs", "");
    let files = collect_files(&fs, &PathBuf::from("/p/main.cljs"), |_| true).unwrap();
    assert_eq!(files, vec![PathBuf::from("/p/main.cljs")]);
}

#[test]
fn clean_outputs_keeps_the_output_directory() {
    let fs = MockFileSystem::new();
    fs.add_file("/p/target/public/out/dev-main.js", "main");
    fs.add_file("/p/target/public/out/dev/a.js", "a");
    fs.add_file("/p/target/public/out/dev/goog/base.js", "b");
    fs.add_file("/p/target/public/out/other/keep.js", "k");

    let removed = clean_outputs(
        &fs,
        &PathBuf::from("/p/target/public/out/dev-main.js"),
        &PathBuf::from("/p/target/public/out/dev"),
    )
    .unwrap();

    assert_eq!(removed, 3);
    assert!(fs.is_dir(&PathBuf::from("/p/target/public/out/dev")));
    assert!(fs.read_dir(&PathBuf::from("/p/target/public/out/dev")).unwrap().is_empty());
    assert!(!fs.exists(&PathBuf::from("/p/target/public/out/dev-main.js")));
    assert!(fs.is_file(&PathBuf::from("/p/target/public/out/other/keep.js")));
}

#[test]
fn clean_outputs_on_missing_paths_removes_nothing() {
    let fs = MockFileSystem::new();
    let removed = clean_outputs(
        &fs,
        &PathBuf::from("/p/none.js"),
        &PathBuf::from("/p/none"),
    )
    .unwrap();
    assert_eq!(removed, 0);
}
