//! Test harness for the round-trip engine against fixture files.
//!
//! Every .yaml file under test/yaml/ is loaded in round-trip mode and dumped
//! again; the output must match the input byte for byte, and a second pass
//! must be stable. Every .yaml file under test/nay/ must fail to load, with an
//! error message containing the fragment stored in the sibling .error file.

use std::fs;
use std::path::{Path, PathBuf};

use librtyaml::{Dumper, DumperOptions, Loader, LoaderOptions, Profile, Schema};

/// Root test directory.
fn test_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).parent().unwrap().join("test")
}

/// All .yaml files in a subdirectory of test/, sorted.
fn fixture_files(subdir: &str) -> Vec<PathBuf> {
    let pattern = test_root().join(subdir).join("*.yaml");
    let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
        .expect("valid glob pattern")
        .flatten()
        .collect();
    files.sort();
    files
}

/// Read the expected error fragment for a .yaml file under test/nay/.
fn read_expected_error(path: &Path) -> Option<String> {
    fs::read_to_string(path.with_extension("error")).ok()
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().to_string()
}

/// Load every document of `input` and dump them again, both in round-trip
/// mode.
fn round_trip(input: &str, name: &str) -> librtyaml::Result<String> {
    let schema = Schema::for_profile(Profile::RoundTrip);
    let options = LoaderOptions::default().with_name(name);
    let documents = Loader::from_str(input, schema.clone(), &options)?.collect::<librtyaml::Result<Vec<_>>>()?;
    let mut dumper = Dumper::new(Vec::new(), schema, &DumperOptions::default());
    for document in &documents {
        dumper.dump_document(document)?;
    }
    Ok(String::from_utf8(dumper.into_inner()?).expect("dumper writes UTF-8"))
}

/// Run a single test/yaml fixture (expected to round-trip unchanged).
fn run_yaml_test(path: &Path) -> Result<(), String> {
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let filename = file_name(path);

    let output = round_trip(&content, &filename).map_err(|e| format!("{}: Unexpected error: {}", filename, e))?;
    if output != content {
        return Err(format!(
            "{}: Output mismatch\n    expected: {:?}\n    actual:   {:?}",
            filename, content, output
        ));
    }

    let again = round_trip(&output, &filename).map_err(|e| format!("{}: Unexpected error on second pass: {}", filename, e))?;
    if again != output {
        return Err(format!(
            "{}: Second pass not stable\n    first:  {:?}\n    second: {:?}",
            filename, output, again
        ));
    }

    println!("  {} => ok", filename);
    Ok(())
}

/// Run a single test/nay fixture (expected to fail with a specific error).
fn run_nay_test(path: &Path) -> Result<(), String> {
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let filename = file_name(path);

    match round_trip(&content, &filename) {
        Ok(output) => Err(format!(
            "{}: Expected an error, but got success: {:?}",
            filename, output
        )),
        Err(e) => {
            let actual_error = e.to_string();
            if !actual_error.contains(&filename) {
                return Err(format!("{}: Error does not name the stream: {}", filename, actual_error));
            }
            match read_expected_error(path) {
                Some(expected) => {
                    let expected = expected.trim();
                    if actual_error.contains(expected) {
                        println!("  {} => error (as expected)", filename);
                        Ok(())
                    } else {
                        Err(format!(
                            "{}: Error mismatch\n    expected: {}\n    actual:   {}",
                            filename, expected, actual_error
                        ))
                    }
                }
                None => {
                    println!("  {} => error: {} (no .error file to compare)", filename, actual_error);
                    Ok(())
                }
            }
        }
    }
}

fn run_all(subdir: &str, run: fn(&Path) -> Result<(), String>) {
    let files = fixture_files(subdir);

    if files.is_empty() {
        println!("No test/{} fixtures found!", subdir);
        return;
    }

    println!("\nRunning {} test/{} fixtures:", files.len(), subdir);

    let mut passed = 0;
    let mut failed = 0;
    let mut errors: Vec<String> = Vec::new();

    for file in &files {
        match run(file) {
            Ok(()) => passed += 1,
            Err(e) => {
                failed += 1;
                errors.push(e);
            }
        }
    }

    println!("\nResults: {} passed, {} failed", passed, failed);

    if !errors.is_empty() {
        println!("\nErrors:");
        for error in &errors {
            println!("  - {}", error);
        }
    }

    assert!(failed == 0, "{} test/{} fixtures failed", failed, subdir);
}

#[test]
fn test_all_yaml_fixtures() {
    run_all("yaml", run_yaml_test);
}

#[test]
fn test_all_nay_fixtures() {
    run_all("nay", run_nay_test);
}
