//! Generate a styled QR code with opaque and transparent downloads
//!
//! Usage: cargo run --example generate_qr

use qrstyle::{
    CornerSquareStyle, DirectorySink, DotStyle, ErrorCorrection, Field, HexColor, QrVerifier,
    RasterEngine, Session, SessionOptions,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let mut session = Session::new(
        Arc::new(RasterEngine::new()),
        Arc::new(DirectorySink::new("qr_output")),
        SessionOptions::default(),
    );

    session.set_field(Field::Value, "https://example.com/hello")?;
    session.set_foreground(HexColor::rgb(0x1f, 0x2a, 0x44))?;
    session.set_dot_style(DotStyle::Rounded)?;
    session.set_corner_square_style(CornerSquareStyle::ExtraRounded)?;
    session.set_error_correction(ErrorCorrection::Q)?;
    session.set_download_size(600)?;

    let state = session.settled().await;
    println!("✓ Preview rendered (generation {})", state.generation);

    let verifier = QrVerifier::new();
    for transparent in [false, true] {
        if let Some(saved) = session.download(transparent).await? {
            let png = std::fs::read(&saved.path)?;
            println!("✓ Saved {} ({}px)", saved.path.display(), saved.size);
            match verifier.decode_png(&png) {
                Ok(scanned) => println!("  Scans back as: {scanned}"),
                Err(err) => println!("  Could not scan back: {err}"),
            }
        }
    }

    session.shutdown().await?;
    Ok(())
}
