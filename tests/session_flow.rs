use std::path::Path;
use std::sync::Arc;

use qrstyle::{
    Background, DataType, DirectorySink, Error, Field, HexColor, Phase, QrVerifier, RasterEngine,
    Session, SessionOptions,
};

fn session(dir: &Path) -> Session<RasterEngine> {
    Session::new(
        Arc::new(RasterEngine::new()),
        Arc::new(DirectorySink::new(dir)),
        SessionOptions::default(),
    )
}

fn saved_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn url_downloads_scan_back_in_both_variants() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = session(dir.path());
    session
        .set_field(Field::Value, "https://example.com")
        .expect("set url");
    session.set_download_size(400).expect("set size");

    let verifier = QrVerifier::new();
    for transparent in [false, true] {
        let saved = session
            .download(transparent)
            .await
            .expect("download")
            .expect("content present");
        assert_eq!(saved.size, 400);
        assert!(saved.file_name.ends_with(".png"));

        let png = std::fs::read(&saved.path).expect("read download");
        let img = image::load_from_memory(&png).expect("valid png").to_rgba8();
        assert_eq!(img.dimensions(), (400, 400));
        let corner_alpha = img.get_pixel(0, 0).0[3];
        assert_eq!(corner_alpha, if transparent { 0 } else { 255 });

        assert_eq!(verifier.decode_png(&png).expect("scan"), "https://example.com");
    }

    let names = saved_files(dir.path());
    assert_eq!(names.len(), 2);
    assert!(names.iter().any(|n| n.starts_with("qrcode-transparent-")));
    assert!(
        names
            .iter()
            .any(|n| n.starts_with("qrcode-") && !n.contains("transparent"))
    );

    session.shutdown().await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn email_payload_scans_back_exactly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = session(dir.path());
    session.set_data_type(DataType::Email).expect("type");
    session.set_field(Field::EmailTo, "a@b.com").expect("to");
    session
        .set_field(Field::EmailSubject, "Hi there")
        .expect("subject");
    session.set_field(Field::EmailBody, "Yo & bye").expect("body");

    let expected = "mailto:a@b.com?subject=Hi%20there&body=Yo%20%26%20bye";
    assert_eq!(session.payload(), expected);

    let state = session.settled().await;
    assert_eq!(state.phase, Phase::Ready);
    let artifact = session.pipeline().current_artifact().expect("artifact");
    let scanned = QrVerifier::new().decode_png(&artifact.png).expect("scan");
    assert_eq!(scanned, expected);

    session.shutdown().await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn latest_edit_wins_after_a_burst() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = session(dir.path());

    for i in 0..20 {
        session
            .set_field(Field::Value, format!("https://example.com/{i}"))
            .expect("edit");
    }
    session
        .set_foreground(HexColor::rgb(0x22, 0x22, 0x22))
        .expect("fg");

    let state = session.settled().await;
    assert_eq!(state.generation, session.pipeline().latest_generation());
    assert_eq!(state.mounts, 1);
    assert_eq!(session.pipeline().registry().live_count(), 1);

    let artifact = session.pipeline().current_artifact().expect("artifact");
    assert_eq!(artifact.generation, state.generation);
    let scanned = QrVerifier::new().decode_png(&artifact.png).expect("scan");
    assert_eq!(scanned, "https://example.com/19");

    session.shutdown().await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn switching_type_discards_everything() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = session(dir.path());
    session.set_field(Field::Value, "some text").expect("text");
    session.settled().await;
    assert!(session.details().is_some());

    session.set_data_type(DataType::Phone).expect("type");
    let state = session.settled().await;
    assert!(state.preview.is_none());
    assert!(state.artifact.is_none());
    assert_eq!(session.pipeline().registry().live_count(), 0);
    assert!(session.details().is_none());
    assert!(session.download(false).await.expect("download").is_none());
    assert!(saved_files(dir.path()).is_empty());

    session.shutdown().await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transparent_download_ignores_configured_background() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = session(dir.path());
    session.set_field(Field::Value, "bg test").expect("text");
    session
        .set_background(Background::Color(HexColor::rgb(0xff, 0xee, 0x00)))
        .expect("bg");

    let saved = session
        .download(true)
        .await
        .expect("download")
        .expect("content present");
    let img = image::open(&saved.path).expect("open").to_rgba8();
    assert_eq!(img.get_pixel(0, 0).0[3], 0);

    // The configured background is untouched for later opaque renders.
    assert_eq!(
        session.style().background,
        Background::Color(HexColor::rgb(0xff, 0xee, 0x00))
    );
    session.shutdown().await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_logo_still_allows_download() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = session(dir.path());

    session.load_logo(dir.path().join("missing/logo.png"));
    let err = session.finish_logo().await.expect_err("missing logo");
    assert!(matches!(err, Error::Upload(_)));

    session
        .set_field(Field::Value, "https://example.com/after-logo")
        .expect("set url");
    let saved = session
        .download(false)
        .await
        .expect("download")
        .expect("content present");
    let png = std::fs::read(&saved.path).expect("read download");
    assert_eq!(
        QrVerifier::new().decode_png(&png).expect("scan"),
        "https://example.com/after-logo"
    );
    assert!(session.details().expect("details").logo.is_none());

    session.shutdown().await.expect("shutdown");
}
