// Representative truncation - bounds output size while keeping a slice of every page
use crate::config::EngineConfig;
use crate::types::{page_section, ExtractionAttempt};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct Truncated {
    pub text: String,
    pub annotated: bool,
    /// Page-text characters kept (excludes headers, ellipses and the annotation).
    pub sampled_chars: usize,
    pub pages_sampled: usize,
    pub original_chars: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct RepresentativeTruncator {
    max_chars: usize,
    max_pages: usize,
}

impl RepresentativeTruncator {
    pub fn new(max_chars: usize, max_pages: usize) -> Self {
        Self { max_chars, max_pages }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.max_chars, config.max_pages)
    }

    /// Samples from the attempt's page sections; unpaginated text is cut from the head.
    pub fn truncate(&self, attempt: &ExtractionAttempt) -> Truncated {
        let total_chars = attempt.total_chars;
        if total_chars <= self.max_chars {
            return Truncated {
                text: attempt.aggregate.clone(),
                annotated: false,
                sampled_chars: total_chars,
                pages_sampled: attempt.pages_with_text,
                original_chars: total_chars,
            };
        }

        let truncated = if attempt.sections.is_empty() {
            self.head(&attempt.aggregate, total_chars)
        } else {
            self.sample(&attempt.sections, total_chars)
        };

        info!(
            from = truncated.original_chars,
            to = truncated.sampled_chars,
            pages = truncated.pages_sampled,
            "aggregate truncated"
        );
        truncated
    }

    fn sample(&self, pages: &[(u32, String)], total_chars: usize) -> Truncated {
        let sharing = pages.len().min(self.max_pages).max(1);
        let chars_per_page = (self.max_chars / sharing).max(1);

        let mut body = String::new();
        let mut used = 0;
        let mut pages_sampled = 0;

        for (number, text) in pages {
            if used >= self.max_chars {
                break;
            }
            let page_len = text.chars().count();
            if page_len == 0 {
                continue;
            }

            let take = page_len.min(chars_per_page).min(self.max_chars - used);
            let prefix: String = text.chars().take(take).collect();
            body.push_str(&page_section(*number, &prefix));
            if page_len > take {
                body.push_str("...");
            }

            used += take;
            pages_sampled += 1;
        }

        let mut text = body.trim().to_string();
        text.push_str(&format!(
            "\n\n... [TRUNCATED FROM {} TO {} CHARACTERS - REPRESENTATIVE SAMPLE FROM {} PAGES] ...",
            total_chars, used, pages_sampled
        ));

        Truncated {
            text,
            annotated: true,
            sampled_chars: used,
            pages_sampled,
            original_chars: total_chars,
        }
    }

    // No page sections to sample from
    fn head(&self, aggregate: &str, total_chars: usize) -> Truncated {
        let mut text: String = aggregate.chars().take(self.max_chars).collect();
        text.push_str("...");
        text.push_str(&format!(
            "\n\n... [TRUNCATED FROM {} TO {} CHARACTERS] ...",
            total_chars, self.max_chars
        ));

        Truncated {
            text,
            annotated: true,
            sampled_chars: self.max_chars,
            pages_sampled: 0,
            original_chars: total_chars,
        }
    }
}
