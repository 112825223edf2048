//! Configurable in-crate provider stub for unit tests.

use hugin_common::{Query, SubjectType};

use super::{MetadataProvider, ParseOutcome};
use crate::download::Page;

type Parser = Box<dyn Fn(&[Page<'_>], &Query) -> ParseOutcome + Send + Sync>;

pub(crate) struct StaticProvider {
    name: &'static str,
    priority: i32,
    subject: SubjectType,
    available: bool,
    targets: Option<Vec<String>>,
    parser: Parser,
}

impl StaticProvider {
    /// A movie provider that builds no targets and finds nothing.
    pub(crate) fn new(name: &'static str, priority: i32) -> Self {
        Self {
            name,
            priority,
            subject: SubjectType::Movie,
            available: true,
            targets: None,
            parser: Box::new(|_, _| ParseOutcome::NotFound),
        }
    }

    pub(crate) fn person(mut self) -> Self {
        self.subject = SubjectType::Person;
        self
    }

    pub(crate) fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub(crate) fn with_targets(mut self, targets: &[&str]) -> Self {
        self.targets = Some(targets.iter().map(|t| t.to_string()).collect());
        self
    }

    pub(crate) fn with_parser<F>(mut self, parser: F) -> Self
    where
        F: Fn(&[Page<'_>], &Query) -> ParseOutcome + Send + Sync + 'static,
    {
        self.parser = Box::new(parser);
        self
    }
}

impl MetadataProvider for StaticProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn subject(&self) -> SubjectType {
        self.subject
    }

    fn supported_fields(&self) -> &'static [&'static str] {
        &["title"]
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn build_targets(&self, _query: &Query) -> Option<Vec<String>> {
        self.targets.clone()
    }

    fn parse(&self, pages: &[Page<'_>], query: &Query) -> ParseOutcome {
        (self.parser)(pages, query)
    }
}
