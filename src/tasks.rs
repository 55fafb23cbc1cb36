//! Research browser tasks.
//!
//! Each task turns its inputs into a natural-language goal and hands it to
//! the action loop. Whatever the loop returns is passed back untouched.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use action_primitives::Surface;
use agent_core::{ActionLoopDriver, ActionLoopResult, AgentError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Credentials;

pub const LIBRARY_URL: &str = "https://library.ucalgary.ca/";
pub const DRIVE_URL: &str = "https://drive.google.com/";

pub const DEFAULT_SECTIONS: [&str; 9] = [
    "Title",
    "Abstract",
    "Introduction",
    "Literature Review",
    "Methodology",
    "Results",
    "Discussion",
    "Conclusion",
    "References",
];

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0} cannot be empty")]
    MissingInput(&'static str),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Style rules of a target journal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalGuidelines {
    pub citation_style: String,
    pub max_word_count: u32,
    pub formatting_notes: String,
    pub reference_format: String,
    /// Section name to requirement.
    pub section_requirements: BTreeMap<String, String>,
    pub figure_requirements: Option<String>,
    pub table_requirements: Option<String>,
}

impl JournalGuidelines {
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    fn instructions(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "Citation Style: {}", self.citation_style);
        let _ = writeln!(text, "Word Count Limit: {} words", self.max_word_count);
        let _ = writeln!(text, "Formatting: {}", self.formatting_notes);
        let _ = writeln!(text, "Reference Format: {}", self.reference_format);
        let _ = writeln!(text, "\nSection Requirements:");
        for (section, requirement) in &self.section_requirements {
            let _ = writeln!(text, "- {section}: {requirement}");
        }
        let _ = writeln!(
            text,
            "\nFigure Requirements: {}",
            self.figure_requirements.as_deref().unwrap_or("N/A")
        );
        let _ = write!(
            text,
            "Table Requirements: {}",
            self.table_requirements.as_deref().unwrap_or("N/A")
        );
        text
    }
}

/// A browser task with its inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum ResearchTask {
    LibrarySearch { query: String },
    DriveLogin,
    CreateDocument { title: String, sections: Vec<String> },
    WriteDocument { url: String, content: String },
    FormatDocument { url: String, guidelines: JournalGuidelines },
}

impl ResearchTask {
    pub fn name(&self) -> &'static str {
        match self {
            ResearchTask::LibrarySearch { .. } => "library_search",
            ResearchTask::DriveLogin => "drive_login",
            ResearchTask::CreateDocument { .. } => "create_document",
            ResearchTask::WriteDocument { .. } => "write_document",
            ResearchTask::FormatDocument { .. } => "format_document",
        }
    }

    /// Goal text for this task. Credentials are embedded as given.
    pub fn goal(&self, credentials: &Credentials) -> Result<String, TaskError> {
        match self {
            ResearchTask::LibrarySearch { query } => library_search(credentials, query),
            ResearchTask::DriveLogin => Ok(drive_login(credentials)),
            ResearchTask::CreateDocument { title, sections } => {
                create_document(title, sections)
            }
            ResearchTask::WriteDocument { url, content } => write_document(url, content),
            ResearchTask::FormatDocument { url, guidelines } => {
                format_document(url, guidelines)
            }
        }
    }
}

fn require<'a>(value: &'a str, field: &'static str) -> Result<&'a str, TaskError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TaskError::MissingInput(field));
    }
    Ok(trimmed)
}

pub fn library_search(credentials: &Credentials, query: &str) -> Result<String, TaskError> {
    let query = require(query, "search query")?;
    Ok(format!(
        "Please help me search for academic papers in the university library.\n\
         Follow these steps:\n\
         1. Navigate to {LIBRARY_URL}\n\
         2. Log in with username '{}' and password '{}'\n\
         3. Navigate to the advanced search page\n\
         4. Search for papers using the following query: {query}\n\
         5. Use advanced filters to limit to peer-reviewed articles from the last 5 years\n\
         6. Download at least 3 relevant papers\n\
         7. Report the titles and authors of the papers you found",
        credentials.library_username, credentials.library_password
    ))
}

pub fn drive_login(credentials: &Credentials) -> String {
    format!(
        "Please help me log in to Google Drive.\n\
         Follow these steps:\n\
         1. Navigate to {DRIVE_URL}\n\
         2. Log in with Google account username '{}' and password '{}'\n\
         3. Navigate to the main Google Drive interface",
        credentials.google_username, credentials.google_password
    )
}

/// An empty `sections` list means [`DEFAULT_SECTIONS`].
pub fn create_document(title: &str, sections: &[String]) -> Result<String, TaskError> {
    let title = require(title, "document title")?;
    let listed: String = if sections.is_empty() {
        DEFAULT_SECTIONS
            .iter()
            .map(|section| format!("- {section}\n"))
            .collect()
    } else {
        sections
            .iter()
            .map(|section| format!("- {}\n", section.trim()))
            .collect()
    };
    Ok(format!(
        "Please help me create a new Google Doc.\n\
         Follow these steps:\n\
         1. Click on the \"New\" button in Google Drive\n\
         2. Select \"Google Docs\" from the dropdown menu\n\
         3. Wait for the new document to open\n\
         4. Name the document \"{title}\"\n\
         5. Set up the document with the following sections:\n\
         {listed}\
         6. Format each section as a heading and add some space below each one\n\
         7. Report the URL of the new document"
    ))
}

pub fn write_document(url: &str, content: &str) -> Result<String, TaskError> {
    let url = require(url, "document url")?;
    let content = require(content, "document content")?;
    Ok(format!(
        "Please help me write content in a Google Doc.\n\
         Follow these steps:\n\
         1. Navigate to {url}\n\
         2. Wait for the document to load completely\n\
         3. Click in the document where the content should be added\n\
         4. Type out the following content:\n\n\
         {content}\n\n\
         5. Format the document appropriately with headings, paragraphs, etc.\n\
         6. Ensure citations are properly formatted"
    ))
}

pub fn format_document(url: &str, guidelines: &JournalGuidelines) -> Result<String, TaskError> {
    let url = require(url, "document url")?;
    let instructions = guidelines.instructions();
    Ok(format!(
        "Please help me format this Google Doc according to specific journal guidelines.\n\
         Follow these steps:\n\
         1. Navigate to {url}\n\
         2. Wait for the document to load completely\n\
         3. Apply the following formatting guidelines:\n\n\
         {instructions}\n\n\
         4. Make sure all citations follow the {style} style\n\
         5. Ensure the document complies with all section-specific requirements\n\
         6. Check that figures and tables (if any) follow the journal's requirements\n\
         7. Make sure the document doesn't exceed {limit} words",
        style = guidelines.citation_style,
        limit = guidelines.max_word_count,
    ))
}

/// Runs research tasks through an [`ActionLoopDriver`].
pub struct TaskRunner {
    driver: ActionLoopDriver,
    credentials: Credentials,
    cancel: CancellationToken,
}

impl TaskRunner {
    pub fn new(driver: ActionLoopDriver, credentials: Credentials) -> Self {
        Self {
            driver,
            credentials,
            cancel: CancellationToken::new(),
        }
    }

    /// Sessions started by this runner end as `Cancelled` once `token` fires.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub async fn run<S: Surface>(
        &self,
        surface: S,
        task: &ResearchTask,
    ) -> Result<ActionLoopResult, TaskError> {
        let goal = match task.goal(&self.credentials) {
            Ok(goal) => goal,
            Err(err) => {
                if let Err(release_err) = surface.release().await {
                    debug!(?release_err, "release after rejected task");
                }
                return Err(err);
            }
        };
        debug!(
            task = task.name(),
            goal = %self.credentials.mask(&goal),
            max_turns = self.driver.config().max_turns,
            "task goal built"
        );

        let result = self
            .driver
            .run_with_cancel(surface, &goal, self.cancel.clone())
            .await?;
        info!(
            task = task.name(),
            session = %result.session_id,
            success = result.is_success(),
            turns = result.turns,
            "task finished"
        );
        Ok(result)
    }

    /// Free-form goal, bypassing the task templates.
    pub async fn run_goal<S: Surface>(
        &self,
        surface: S,
        goal: &str,
    ) -> Result<ActionLoopResult, TaskError> {
        Ok(self
            .driver
            .run_with_cancel(surface, goal, self.cancel.clone())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            library_username: "jdoe".into(),
            library_password: "pa55word".into(),
            google_username: "jdoe@example.com".into(),
            google_password: "g-secret".into(),
        }
    }

    #[test]
    fn library_search_goal_embeds_query_and_login() {
        let goal = library_search(&credentials(), "  microplastics in rivers ").unwrap();
        assert!(goal.contains(LIBRARY_URL));
        assert!(goal.contains("username 'jdoe' and password 'pa55word'"));
        assert!(goal.contains("query: microplastics in rivers\n"));
        assert!(goal.contains("peer-reviewed articles from the last 5 years"));
    }

    #[test]
    fn empty_query_is_rejected() {
        let err = library_search(&credentials(), "   ").unwrap_err();
        assert!(matches!(err, TaskError::MissingInput("search query")));
    }

    #[test]
    fn create_document_defaults_sections() {
        let goal = create_document("Thesis draft", &[]).unwrap();
        for section in DEFAULT_SECTIONS {
            assert!(goal.contains(&format!("- {section}\n")), "{section} missing");
        }
        assert!(goal.contains("Name the document \"Thesis draft\""));
    }

    #[test]
    fn create_document_uses_given_sections() {
        let goal = create_document("Notes", &["Summary".into(), "Open problems".into()]).unwrap();
        assert!(goal.contains("- Summary\n- Open problems\n"));
        assert!(!goal.contains("- Abstract"));
    }

    #[test]
    fn format_document_lists_guidelines() {
        let guidelines = JournalGuidelines::from_yaml(
            "citation_style: APA\n\
             max_word_count: 8000\n\
             formatting_notes: Double spaced\n\
             reference_format: APA 7th\n\
             section_requirements:\n  Abstract: 250 words max\n",
        )
        .unwrap();
        let goal = format_document("https://docs.google.com/document/d/abc", &guidelines).unwrap();
        assert!(goal.contains("Citation Style: APA"));
        assert!(goal.contains("- Abstract: 250 words max"));
        assert!(goal.contains("Figure Requirements: N/A"));
        assert!(goal.contains("exceed 8000 words"));
    }

    #[test]
    fn task_names_are_stable() {
        let task = ResearchTask::WriteDocument {
            url: "u".into(),
            content: "c".into(),
        };
        assert_eq!(task.name(), "write_document");
        assert_eq!(ResearchTask::DriveLogin.name(), "drive_login");
        assert!(ResearchTask::DriveLogin
            .goal(&credentials())
            .unwrap()
            .contains("'jdoe@example.com'"));
    }
}
