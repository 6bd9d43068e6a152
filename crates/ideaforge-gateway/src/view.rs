//! Server-rendered views, one per session state.

use ideaforge_core::{
    IdeaFormData, SessionSnapshot, ViewState, COMPLEXITY_OPTIONS, MONETIZATION_OPTIONS,
};

const PAGE_STYLE: &str = "body{font-family:system-ui,sans-serif;background:#0f172a;color:#e2e8f0;margin:0}\
main{max-width:960px;margin:0 auto;padding:2rem}\
label{display:block;margin:.75rem 0 .25rem}\
input,select{width:100%;padding:.5rem;border-radius:.5rem;border:1px solid #334155;background:#1e293b;color:#e2e8f0}\
button{margin-top:1rem;padding:.6rem 1.2rem;border:0;border-radius:.5rem;background:#2563eb;color:#fff;font-weight:700}\
.grid{display:grid;grid-template-columns:repeat(auto-fit,minmax(280px,1fr));gap:1rem}\
.grid img,video{width:100%;border-radius:.75rem}\
.error{background:#7f1d1d80;border:1px solid #b91c1c;padding:1.5rem;border-radius:.75rem}";

/// Whole page for the current snapshot.
pub fn render_page(snapshot: &SessionSnapshot) -> String {
    let (body, refresh) = match snapshot.state {
        ViewState::NeedsCredentials => (render_key_prompt(snapshot), false),
        ViewState::Form => (render_form(&IdeaFormData::default()), false),
        ViewState::Loading => (render_loading(snapshot), true),
        ViewState::Error => (render_error(snapshot), false),
        ViewState::Results => (render_results(snapshot), false),
    };
    let refresh_tag = if refresh {
        r#"<meta http-equiv="refresh" content="3">"#
    } else {
        ""
    };
    format!(
        r#"<!doctype html><html><head><meta charset="utf-8"><title>IdeaForge</title>{}<style>{}</style></head><body><main><h1>SaaS Idea Generator</h1>{}</main></body></html>"#,
        refresh_tag, PAGE_STYLE, body
    )
}

fn render_key_prompt(snapshot: &SessionSnapshot) -> String {
    let notice = snapshot
        .error
        .as_ref()
        .map(|e| format!(r#"<p class="error">{}</p>"#, html_escape(&e.message)))
        .unwrap_or_default();
    format!(
        r#"<section><h2>API Key Required for Video Generation</h2>{}<p>Generating videos requires a Google AI API key. Using this feature may incur costs on your Google Cloud project.</p><form method="post" action="/credentials"><label for="api_key">API key</label><input id="api_key" name="api_key" type="password" autocomplete="off" required><button type="submit">Select API Key</button></form></section>"#,
        notice
    )
}

fn text_field(label: &str, name: &str, value: &str, placeholder: &str) -> String {
    format!(
        r#"<label for="{name}">{label}</label><input id="{name}" name="{name}" type="text" value="{value}" placeholder="{placeholder}">"#,
        name = name,
        label = label,
        value = html_escape(value),
        placeholder = placeholder
    )
}

fn select_field(label: &str, name: &str, options: &[&str], selected: &str) -> String {
    let opts: String = options
        .iter()
        .map(|o| {
            let sel = if *o == selected { " selected" } else { "" };
            format!("<option{}>{}</option>", sel, html_escape(o))
        })
        .collect();
    format!(
        r#"<label for="{name}">{label}</label><select id="{name}" name="{name}">{opts}</select>"#,
        name = name,
        label = label,
        opts = opts
    )
}

fn render_form(form: &IdeaFormData) -> String {
    format!(
        r#"<form method="post" action="/generate">{}{}{}{}{}<button type="submit">Generate My Startup Idea</button></form><p>Fill out the form to generate AI-powered images and a concept video for your next big startup idea.</p>"#,
        text_field("Industry", "industry", &form.industry, "e.g., E-commerce, FinTech"),
        text_field("Target Audience", "audience", &form.audience, "e.g., Developers, Marketers"),
        text_field("Tech Stack Preference", "stack", &form.stack, "e.g., Python, serverless"),
        select_field("Monetization Model", "monetization", MONETIZATION_OPTIONS, &form.monetization),
        select_field("Business Complexity", "complexity", COMPLEXITY_OPTIONS, &form.complexity),
    )
}

fn render_loading(snapshot: &SessionSnapshot) -> String {
    let status = snapshot
        .result
        .status
        .as_deref()
        .map(|s| format!("<p>{}</p>", html_escape(s)))
        .unwrap_or_default();
    format!(
        r#"<section><p><strong>Generating media assets...</strong></p>{}<p>This might take a few minutes, especially for video.</p></section>"#,
        status
    )
}

fn render_error(snapshot: &SessionSnapshot) -> String {
    let message = snapshot
        .error
        .as_ref()
        .map(|e| e.message.as_str())
        .unwrap_or("An unexpected error occurred.");
    format!(
        r#"<section class="error"><p><strong>An Error Occurred</strong></p><p>{}</p><form method="post" action="/back"><button type="submit">Try Again</button></form></section>"#,
        html_escape(message)
    )
}

fn render_results(snapshot: &SessionSnapshot) -> String {
    let mut out = String::from(
        r#"<form method="post" action="/back"><button type="submit">Generate New Assets</button></form>"#,
    );
    if let Some(video) = &snapshot.result.video {
        out.push_str(&format!(
            r#"<section><h2>Generated Concept Video</h2><video src="{}" controls autoplay loop muted></video></section>"#,
            html_escape(video)
        ));
    }
    if !snapshot.result.images.is_empty() {
        out.push_str(r#"<section><h2>Generated Concept Images</h2><div class="grid">"#);
        for (i, src) in snapshot.result.images.iter().enumerate() {
            out.push_str(&format!(
                r#"<img src="{}" alt="Generated startup concept image {}">"#,
                html_escape(src),
                i + 1
            ));
        }
        out.push_str("</div></section>");
    }
    out
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaforge_core::{ClassifiedFailure, GenerationResult};

    fn snapshot(state: ViewState) -> SessionSnapshot {
        SessionSnapshot {
            state,
            cycle: 1,
            form: None,
            result: GenerationResult::default(),
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    #[test]
    fn form_is_prefilled_with_defaults() {
        let html = render_page(&snapshot(ViewState::Form));
        assert!(html.contains(r#"value="Healthcare""#));
        assert!(html.contains("<option selected>Medium</option>"));
        assert!(html.contains(r#"action="/generate""#));
    }

    #[test]
    fn loading_refreshes_and_shows_status() {
        let mut snap = snapshot(ViewState::Loading);
        snap.result.status = Some("Generating video... This can take a couple of minutes.".into());
        let html = render_page(&snap);
        assert!(html.contains(r#"http-equiv="refresh""#));
        assert!(html.contains("Generating video..."));
    }

    #[test]
    fn error_message_is_escaped() {
        let mut snap = snapshot(ViewState::Error);
        snap.error = Some(ClassifiedFailure::from_description("<script>boom</script>"));
        let html = render_page(&snap);
        assert!(html.contains("&lt;script&gt;boom"));
        assert!(html.contains("Try Again"));
    }

    #[test]
    fn results_list_video_and_images() {
        let mut snap = snapshot(ViewState::Results);
        snap.result.images = vec!["data:image/png;base64,AAA=".into(); 4];
        snap.result.video = Some("/media/0b4e7c2e-8d1a-4c35-9b53-4f1f3f0c6a11".into());
        let html = render_page(&snap);
        assert_eq!(html.matches("<img ").count(), 4);
        assert!(html.contains(r#"<video src="/media/0b4e7c2e"#));
        assert!(!html.contains("http-equiv"));
    }

    #[test]
    fn key_prompt_shows_rejection_notice() {
        let mut snap = snapshot(ViewState::NeedsCredentials);
        snap.error = Some(ClassifiedFailure::from_description(
            "Requested entity was not found.",
        ));
        let html = render_page(&snap);
        assert!(html.contains("problem with your API key"));
        assert!(html.contains(r#"action="/credentials""#));
    }
}
