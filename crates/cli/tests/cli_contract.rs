use assert_cmd::cargo::cargo_bin_cmd;
use lopdf::{dictionary, Document, Object};
use predicates::prelude::*;
use serde_json::{json, Value};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

fn write_pdf(dir: &Path, name: &str, pages: usize) -> PathBuf {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..pages)
        .map(|_| doc.add_object(dictionary! { "Type" => "Page", "Parent" => pages_id }).into())
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => pages as i64,
            "Kids" => kids,
            "MediaBox" => [0, 0, 612, 792].into_iter().map(Object::Integer).collect::<Vec<_>>(),
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let path = dir.join(name);
    doc.save(&path).expect("fixture pdf should be written");
    path
}

fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    image::RgbaImage::from_pixel(width, height, image::Rgba([255, 255, 255, 255]))
        .save(&path)
        .expect("fixture png should be written");
    path
}

fn run_json<I, S>(args: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output =
        cargo_bin_cmd!("scoremark").args(args).assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout should contain valid json")
}

#[test]
fn info_reports_canvas_geometry_for_pdf() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_pdf(temp.path(), "score.pdf", 2);

    let value = run_json([OsStr::new("info"), pdf.as_os_str()]);
    assert_eq!(value["kind"], "paginated");
    assert_eq!(value["page_count"], 2);
    assert_eq!(value["pages"][1]["canvas_width"], 1224);
    assert_eq!(value["pages"][1]["canvas_height"], 1584);
    assert_eq!(value["pages"][1]["scale"], 2.0);
}

#[test]
fn info_reports_single_page_for_image() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let png = write_png(temp.path(), "scan.png", 300, 400);

    let value = run_json([OsStr::new("info"), png.as_os_str()]);
    assert_eq!(value["kind"], "image");
    assert_eq!(value["page_count"], 1);
    assert_eq!(value["pages"][0]["native_width"], 300.0);
}

#[test]
fn info_fails_for_missing_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    cargo_bin_cmd!("scoremark")
        .arg("info")
        .arg(temp.path().join("missing.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn info_fails_for_invalid_pdf() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let path = temp.path().join("invalid.pdf");
    fs::write(&path, b"%PDF-1.7\nthis is not a pdf").expect("fixture should be written");

    cargo_bin_cmd!("scoremark")
        .arg("info")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open"));
}

#[test]
fn render_burns_notes_into_png() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_pdf(temp.path(), "score.pdf", 2);
    let notes = temp.path().join("notes.json");
    let stroke = json!({
        "points": [{"x": 100.0, "y": 200.0}, {"x": 400.0, "y": 200.0}, {"x": 700.0, "y": 200.0}],
        "color": "#ff0000",
        "size": 12.0,
        "opacity": 1.0,
        "tool": "pen"
    });
    let payload = json!([{}, {"strokes": [stroke]}]).to_string();
    fs::write(&notes, payload).expect("notes should be written");
    let output = temp.path().join("out/page2.png");

    cargo_bin_cmd!("scoremark")
        .arg("render")
        .arg(&pdf)
        .args(["--page", "2"])
        .arg("--notes")
        .arg(&notes)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("page2.png"));

    let image = image::open(&output).expect("output should be a readable image").to_rgba8();
    assert_eq!(image.dimensions(), (1224, 1584));
    let ink = image.get_pixel(400, 200);
    assert!(ink[0] > 200 && ink[1] < 60, "stroke should be burned in, got {ink:?}");
}

#[test]
fn render_rejects_page_zero() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_pdf(temp.path(), "score.pdf", 1);

    cargo_bin_cmd!("scoremark")
        .arg("render")
        .arg(&pdf)
        .args(["--page", "0", "--output"])
        .arg(temp.path().join("out.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("1-based"));
}

#[test]
fn export_reports_skipped_items_and_succeeds() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let sources = temp.path().join("sources");
    fs::create_dir_all(&sources).expect("sources dir should be created");
    write_pdf(&sources, "air.pdf", 2);

    let manifest = temp.path().join("manifest.json");
    let body = json!({
        "title": "Spring Concert",
        "items": [
            {"id": "a", "title": "Air", "sourceRef": "air.pdf", "sourceKind": "paginated"},
            {"id": "b", "title": "Bourree", "sourceRef": "bourree.pdf", "sourceKind": "paginated"}
        ]
    });
    fs::write(&manifest, body.to_string()).expect("manifest should be written");
    let out_dir = temp.path().join("out");

    cargo_bin_cmd!("scoremark")
        .arg("export")
        .arg(&manifest)
        .arg("--sources")
        .arg(&sources)
        .arg("--output-dir")
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Spring Concert_"))
        .stderr(predicate::str::contains("Bourree"));

    let written: Vec<PathBuf> = fs::read_dir(&out_dir)
        .expect("output dir should exist")
        .map(|entry| entry.expect("entry should be readable").path())
        .collect();
    assert_eq!(written.len(), 1);
    let doc = Document::load(&written[0]).expect("export should be a valid pdf");
    assert_eq!(doc.get_pages().len(), 3);
}

#[test]
fn notes_list_prints_empty_array_for_new_store() {
    let temp = tempfile::tempdir().expect("temp dir should be created");

    let args = ["notes", "list", "--owner", "ana", "--store"].map(OsStr::new);
    let value = run_json(args.into_iter().chain([temp.path().as_os_str()]));
    assert_eq!(value, json!([]));
}
