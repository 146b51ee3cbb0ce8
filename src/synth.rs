//! Article page synthesis.
//!
//! A resolved record becomes a complete HTML document: filler article text around a
//! countdown container and an inert continue button. The destination travels to the
//! gate in a single JSON hand-off slot (`#article-state`).

use rand::seq::SliceRandom;
use serde::Serialize;

use crate::gate::GateConfig;
use crate::model::LinkRecord;
use crate::util::escape_html;

pub const SITE_NAME: &str = "ArticleHub";
pub const STATE_SLOT_ID: &str = "article-state";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: String,
    pub paragraphs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleText {
    pub introduction: String,
    pub sections: Vec<Section>,
    pub conclusion: String,
}

/// Source of the article body. Wording may vary between calls, but a non-empty
/// title always yields a non-empty article.
pub trait FillerSource: Send + Sync {
    fn generate(&self, title: &str) -> ArticleText;
}

const TOPIC_TABLE: &[(&str, [&str; 4])] = &[
    ("business", ["strategy", "growth", "management", "leadership"]),
    ("technology", ["innovation", "digital", "software", "development"]),
    ("marketing", ["advertising", "social media", "branding", "content"]),
    ("finance", ["investment", "money", "banking", "economics"]),
    ("health", ["wellness", "fitness", "nutrition", "medical"]),
    ("education", ["learning", "training", "skills", "knowledge"]),
];
const FALLBACK_TOPICS: [&str; 4] = ["general", "information", "insights", "analysis"];
const MAX_SECTIONS: usize = 4;

/// Keyword-driven filler used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct TopicFiller;

impl TopicFiller {
    fn topics(title: &str) -> Vec<&'static str> {
        let lower = title.to_lowercase();
        let mut out = Vec::new();
        for (category, topics) in TOPIC_TABLE {
            if lower.contains(category) || topics.iter().any(|t| lower.contains(t)) {
                out.extend_from_slice(topics);
            }
        }
        if out.is_empty() {
            out.extend_from_slice(&FALLBACK_TOPICS);
        }
        out.truncate(MAX_SECTIONS);
        out
    }
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|w| {
            let mut cs = w.chars();
            match cs.next() {
                Some(f) => f.to_uppercase().chain(cs.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl FillerSource for TopicFiller {
    fn generate(&self, title: &str) -> ArticleText {
        let subject = title.to_lowercase();
        let intros = [
            format!("In today's rapidly evolving landscape, understanding {subject} has become increasingly important for professionals and enthusiasts alike."),
            format!("This comprehensive guide explores the key aspects of {subject} and provides valuable insights for readers."),
            format!("Whether you're new to {subject} or looking to deepen your knowledge, this article offers practical information and expert analysis."),
        ];
        let introduction = intros
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_default();

        let sections = Self::topics(title)
            .into_iter()
            .map(|topic| Section {
                heading: title_case(&format!("Understanding {topic} in modern context")),
                paragraphs: vec![
                    format!("The role of {topic} has evolved significantly in recent years, driven by technological advances and changing market dynamics."),
                    format!("Key considerations when approaching {topic} include strategic planning, implementation best practices, and measuring success."),
                    "Industry experts recommend a systematic approach that balances innovation with proven methodologies.".to_string(),
                    format!("By focusing on {topic}, organizations can achieve better results and maintain competitive advantages in their respective markets."),
                ],
            })
            .collect();

        ArticleText {
            introduction,
            sections,
            conclusion: format!("In conclusion, {subject} represents both opportunities and challenges in today's environment. By staying informed and adopting best practices, individuals and organizations can navigate this landscape successfully. Remember to continue learning and adapting as new developments emerge in this field."),
        }
    }
}

/// Contents of the `#article-state` slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageState {
    pub destination_url: String,
    #[serde(flatten)]
    pub gate: GateConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub title: String,
    pub meta_description: String,
    pub body: String,
    pub state: PageState,
}

pub fn meta_description(title: &str) -> String {
    format!("Read about {title} on {SITE_NAME}. Professional insights and analysis.")
}

pub fn synthesize(record: &LinkRecord, filler: &dyn FillerSource, gate: GateConfig) -> RenderedDocument {
    let text = filler.generate(&record.title);
    let t = escape_html(&record.title);

    let mut body = String::with_capacity(8 * 1024);
    body.push_str(&format!(
        r#"<header class="header"><nav class="navbar"><div class="container"><a href="/" class="logo">{SITE_NAME}</a></div></nav></header>
<section class="article-header"><div class="container">
<h1 class="article-title-main">{t}</h1>
<p class="article-meta-main">Published on {date} | Professional Analysis</p>
</div></section>
<main class="article-body"><div class="container"><div class="article-content-main">
<p>{intro}</p>
"#,
        date = chrono::Utc::now().format("%B %-d, %Y"),
        intro = escape_html(&text.introduction),
    ));
    for s in &text.sections {
        body.push_str(&format!("<h2>{}</h2>\n", escape_html(&s.heading)));
        for p in &s.paragraphs {
            body.push_str(&format!("<p>{}</p>\n", escape_html(p)));
        }
    }
    body.push_str(&format!(
        r#"<div class="countdown-container" id="countdown">
<div class="countdown-timer">{start}</div>
<p class="countdown-text">Please wait while we prepare your content...</p>
</div>
<h2>Key Takeaways</h2>
<p>Understanding the nuances of this topic requires careful consideration of multiple factors and perspectives. The insights shared in this article provide a foundation for further exploration and practical application.</p>
<h2>Looking Forward</h2>
<p>As this field continues to evolve, staying informed about new developments and best practices will be crucial for success. We encourage readers to continue their learning journey and apply these insights in their professional endeavors.</p>
<p>{conclusion}</p>
<button class="continue-btn" id="continueBtn" hidden aria-disabled="true">Continue to Read</button>
</div></div></main>
<footer class="footer"><div class="container"><p>&copy; {SITE_NAME}. All rights reserved.</p></div></footer>
"#,
        start = gate.countdown_start,
        conclusion = escape_html(&text.conclusion),
    ));

    RenderedDocument {
        title: format!("{} - {SITE_NAME}", record.title),
        meta_description: meta_description(&record.title),
        body,
        state: PageState {
            destination_url: record.target_url.clone(),
            gate,
        },
    }
}

/// JSON for embedding inside `<script>`; `<` is escaped so the payload cannot close the tag.
fn script_json<T: Serialize>(v: &T) -> String {
    serde_json::to_string(v)
        .unwrap_or_else(|_| "{}".to_string())
        .replace('<', "\\u003c")
}

impl RenderedDocument {
    pub fn to_html(&self) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<meta name="description" content="{desc}">
<link rel="stylesheet" href="/css/style.css">
</head>
<body>
{body}<script type="application/json" id="{STATE_SLOT_ID}">{state}</script>
<script src="/js/gate.js" defer></script>
</body>
</html>
"#,
            title = escape_html(&self.title),
            desc = escape_html(&self.meta_description),
            body = self.body,
            state = script_json(&self.state),
        )
    }
}

pub fn not_found_document() -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Article Not Found - {SITE_NAME}</title></head>
<body>
<div class="not-found">
<h1>404</h1>
<h2>Article Not Found</h2>
<p>The article you're looking for doesn't exist or has been removed.</p>
<a href="/">Go Home</a>
</div>
</body>
</html>
"#
    )
}

/// Shell served at `/article.html` without query parameters. A `#/out/{id}/{slug}`
/// fragment never reaches the server, so the shell moves it into the path.
pub fn hash_loader_document() -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Loading Article... - {SITE_NAME}</title></head>
<body>
<p class="loading">Loading Article...</p>
<script>
(function () {{
  var m = window.location.hash.match(/^#(\/out\/[^\/]+\/.+)$/);
  window.location.replace(m ? m[1] : "/");
}})();
</script>
</body>
</html>
"##
    )
}

/// Browser binding for the gate; reads its constants from `#article-state`.
pub const GATE_JS: &str = include_str!("../assets/gate.js");
