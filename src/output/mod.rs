//! Helpers for rendering session results as terminal text or JSON

use crate::content::DataType;
use crate::download::SavedDownload;
use crate::pipeline::{Phase, PipelineState};
use crate::session::Details;
use serde_json::{Value, json};

/// Combined structured and human-readable representation of a result
#[derive(Debug, Clone)]
pub struct Rendered {
    /// Structured JSON representation suitable for downstream consumers
    pub json: Value,
    /// Human-readable lines for terminal presentation
    pub human: Vec<String>,
}

/// Render the details panel, or the placeholder when there is no content.
pub fn render_details(details: Option<&Details>) -> Rendered {
    let Some(details) = details else {
        return Rendered {
            json: json!({ "details": Value::Null }),
            human: vec!["Enter content to generate your QR code".to_string()],
        };
    };

    let mut human = vec!["QR Code Details".to_string()];
    human.push(format!("  Type: {}", data_type_label(details.data_type)));
    human.push(format!("  Payload: {}", format_text_snippet(&details.payload)));
    human.push(format!(
        "  Size: {0}x{0}px",
        details.download_size
    ));
    human.push(format!("  Style: {}", details.dot_style));
    human.push(format!(
        "  Error correction: {} - {}",
        details.error_correction,
        details.error_correction.describe()
    ));
    match &details.logo {
        Some(logo) => human.push(format!("  Logo: {} ({}%)", logo.name, logo.size_percent)),
        None => human.push("  Logo: none".to_string()),
    }

    let json = json!({
        "details": {
            "data_type": details.data_type,
            "payload": details.payload,
            "download_size": details.download_size,
            "dot_style": details.dot_style,
            "error_correction": details.error_correction,
            "logo": details.logo,
        }
    });

    Rendered { json, human }
}

/// Render the outcome of a download command.
pub fn render_download(saved: Option<&SavedDownload>) -> Rendered {
    match saved {
        Some(saved) => {
            let kind = if saved.transparent {
                "transparent"
            } else {
                "opaque"
            };
            Rendered {
                json: json!({ "download": saved }),
                human: vec![format!(
                    "Saved {kind} {0}x{0}px QR code to {1}",
                    saved.size,
                    saved.path.display()
                )],
            }
        }
        None => Rendered {
            json: json!({ "download": Value::Null }),
            human: vec!["Nothing to download: enter content first".to_string()],
        },
    }
}

/// Render the pipeline's current state.
pub fn render_state(state: &PipelineState) -> Rendered {
    let phase = phase_label(state.phase);
    let mut human = vec![format!("Preview: {phase} (generation {})", state.generation)];
    if let Some(preview) = &state.preview {
        human.push(format!(
            "  Frame: {}x{}px from generation {}",
            preview.image.width(),
            preview.image.height(),
            preview.generation
        ));
    }
    if let Some(handle) = &state.artifact {
        human.push(format!("  Artifact: {handle}"));
    }
    if let Some(err) = &state.last_error {
        human.push(format!("  Last error: {err}"));
    }

    let json = json!({
        "state": {
            "phase": phase,
            "generation": state.generation,
            "preview_generation": state.preview.as_ref().map(|p| p.generation),
            "artifact": state.artifact.as_ref().map(|h| h.to_string()),
            "mounts": state.mounts,
            "last_error": state.last_error,
        }
    });

    Rendered { json, human }
}

/// Render a round-trip scan result.
pub fn render_verification(expected: &str, scanned: &str) -> Rendered {
    let matches = expected == scanned;
    let human = if matches {
        vec![format!("Verified: scans back as {}", format_text_snippet(scanned))]
    } else {
        vec![
            "Verification failed".to_string(),
            format!("  Expected: {}", format_text_snippet(expected)),
            format!("  Scanned: {}", format_text_snippet(scanned)),
        ]
    };
    Rendered {
        json: json!({ "verify": { "ok": matches, "expected": expected, "scanned": scanned } }),
        human,
    }
}

fn data_type_label(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Url => "URL",
        DataType::Text => "Text",
        DataType::Email => "Email",
        DataType::Phone => "Phone",
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "idle",
        Phase::Rendering => "rendering",
        Phase::Ready => "ready",
        Phase::Closed => "closed",
    }
}

fn format_text_snippet(text: &str) -> String {
    const MAX: usize = 120;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let snippet: String = text.chars().take(MAX).collect();
        let total = text.chars().count();
        format!("{}... ({} chars)", snippet, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::LogoDetails;
    use crate::style::{DotStyle, ErrorCorrection};
    use std::path::PathBuf;

    fn details() -> Details {
        Details {
            data_type: DataType::Email,
            payload: "mailto:a@b.com?subject=Hi".to_string(),
            download_size: 300,
            dot_style: DotStyle::ExtraRounded,
            error_correction: ErrorCorrection::M,
            logo: Some(LogoDetails {
                name: "logo.png".to_string(),
                size_percent: 30,
            }),
        }
    }

    #[test]
    fn details_render_consistently() {
        let rendered = render_details(Some(&details()));

        assert_eq!(rendered.json["details"]["data_type"], "email");
        assert_eq!(rendered.json["details"]["dot_style"], "extra-rounded");
        assert_eq!(rendered.json["details"]["logo"]["size_percent"], 30);
        assert!(rendered.human.iter().any(|line| line == "  Type: Email"));
        assert!(rendered.human.iter().any(|line| line == "  Size: 300x300px"));
        assert!(
            rendered
                .human
                .iter()
                .any(|line| line.contains("Logo: logo.png (30%)"))
        );
    }

    #[test]
    fn placeholder_without_content() {
        let rendered = render_details(None);
        assert!(rendered.json["details"].is_null());
        assert_eq!(rendered.human.len(), 1);
    }

    #[test]
    fn download_lines_name_the_variant() {
        let saved = SavedDownload {
            path: PathBuf::from("out/qrcode-transparent-1.png"),
            file_name: "qrcode-transparent-1.png".to_string(),
            size: 500,
            transparent: true,
        };
        let rendered = render_download(Some(&saved));
        assert_eq!(rendered.json["download"]["transparent"], true);
        assert!(rendered.human[0].contains("transparent 500x500px"));
    }

    #[test]
    fn long_payloads_are_truncated() {
        let long = "x".repeat(300);
        assert!(format_text_snippet(&long).ends_with("(300 chars)"));
    }
}
