//! User-intent commands from the UI

use crate::model::MovieKind;
use super::SearchController;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    TitleChanged(String),
    YearChanged(String),
    KindChanged(Option<MovieKind>),
    LoadMore,
    Reset,
}

impl SearchController {
    pub fn on_title_change(&self, title: impl Into<String>) {
        self.send(Command::TitleChanged(title.into()));
    }

    /// Blank text clears the year filter
    pub fn on_year_change(&self, year: impl Into<String>) {
        self.send(Command::YearChanged(year.into()));
    }

    /// `None` clears the kind filter
    pub fn on_type_change(&self, kind: Option<MovieKind>) {
        self.send(Command::KindChanged(kind));
    }

    /// Fetch the next page for the current query, e.g. near the end of a list
    pub fn load_more(&self) {
        self.send(Command::LoadMore);
    }

    /// Clear results and input, cancelling any pending or in-flight search
    pub fn reset(&self) {
        self.send(Command::Reset);
    }

    fn send(&self, command: Command) {
        tracing::trace!(?command, "Queueing command");
        if self.commands.send(command).is_err() {
            tracing::warn!("Search controller is shut down, command dropped");
        }
    }
}
