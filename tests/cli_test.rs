use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*;
use std::path::PathBuf;
use std::process::Command; // Run programs
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

const SAM: &str = "I am Sam. Sam I am. I do not like this Sam I am.\n";

fn put_file(temp_dir: &tempfile::TempDir,name: &str,dat: &[u8]) -> Result<PathBuf,Box<dyn std::error::Error>> {
    let path = temp_dir.path().join(name);
    std::fs::write(&path,dat)?;
    Ok(path)
}

fn compress_file(in_path: &PathBuf,out_path: &PathBuf) -> STDRESULT {
    let mut cmd = Command::cargo_bin("huffpack")?;
    cmd.arg("compress")
        .arg("-i").arg(in_path)
        .arg("-o").arg(out_path)
        .assert()
        .success()
        .stderr(predicate::str::contains("compressed"));
    Ok(())
}

fn expand_file(in_path: &PathBuf,out_path: &PathBuf) -> STDRESULT {
    let mut cmd = Command::cargo_bin("huffpack")?;
    cmd.arg("expand")
        .arg("-i").arg(in_path)
        .arg("-o").arg(out_path)
        .assert()
        .success()
        .stderr(predicate::str::contains("expanded"));
    Ok(())
}

#[test]
fn compression() -> STDRESULT {
    // tree is 1 01 'B' 1 00 01 'A', codes are A=11 B=0 end=10
    let temp_dir = tempfile::tempdir()?;
    let in_path = put_file(&temp_dir,"ab.txt",b"AB")?;
    let out_path = temp_dir.path().join("ab.huf");
    compress_file(&in_path,&out_path)?;
    assert_eq!(std::fs::read(out_path)?,hex::decode("A85141D0")?);
    Ok(())
}

#[test]
fn expansion() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = put_file(&temp_dir,"ab.huf",&hex::decode("A85141D0")?)?;
    let out_path = temp_dir.path().join("ab.txt");
    expand_file(&in_path,&out_path)?;
    assert_eq!(std::fs::read(out_path)?,b"AB".to_vec());
    Ok(())
}

#[test]
fn invertibility() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let test_data = SAM.repeat(40);
    let in_path = put_file(&temp_dir,"sam.txt",test_data.as_bytes())?;
    let cmp_path = temp_dir.path().join("sam.huf");
    let out_path = temp_dir.path().join("sam_expanded.txt");
    compress_file(&in_path,&cmp_path)?;
    assert!(std::fs::read(&cmp_path)?.len() < test_data.len());
    expand_file(&cmp_path,&out_path)?;
    assert_eq!(std::fs::read(out_path)?,test_data.as_bytes().to_vec());
    Ok(())
}

#[test]
fn empty_file() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = put_file(&temp_dir,"empty.txt",&[])?;
    let cmp_path = temp_dir.path().join("empty.huf");
    let out_path = temp_dir.path().join("empty_expanded.txt");
    compress_file(&in_path,&cmp_path)?;
    // the tree is just the end marker, with an empty code
    assert_eq!(std::fs::read(&cmp_path)?,vec![0]);
    expand_file(&cmp_path,&out_path)?;
    assert_eq!(std::fs::read(out_path)?.len(),0);
    Ok(())
}

#[test]
fn small_chunks() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = put_file(&temp_dir,"sam.txt",SAM.as_bytes())?;
    let ref_path = temp_dir.path().join("ref.huf");
    let out_path = temp_dir.path().join("chunked.huf");
    compress_file(&in_path,&ref_path)?;
    let mut cmd = Command::cargo_bin("huffpack")?;
    cmd.arg("compress")
        .arg("-c").arg("3")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&out_path)
        .assert()
        .success();
    assert_eq!(std::fs::read(ref_path)?,std::fs::read(out_path)?);
    Ok(())
}

#[test]
fn truncated_input_fails() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = put_file(&temp_dir,"ab.huf",&hex::decode("A851")?)?;
    let out_path = temp_dir.path().join("ab.txt");
    let mut cmd = Command::cargo_bin("huffpack")?;
    cmd.arg("expand")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&out_path)
        .assert()
        .failure();
    Ok(())
}

#[test]
fn show_codes() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = put_file(&temp_dir,"ab.huf",&hex::decode("A85141D0")?)?;
    let mut cmd = Command::cargo_bin("huffpack")?;
    cmd.arg("codes")
        .arg("-i").arg(&in_path)
        .assert()
        .success()
        .stdout("0x41 'A'     11\n0x42 'B'     0\nend          10\n");
    Ok(())
}
