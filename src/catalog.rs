use crate::{
    game::{known_platforms, Game, Manifest, Metadata},
    manifest::{fetch_manifest, FetchError, ManifestLocation},
    view::{self, CatalogView, Filter, Selection, SortDirection, SortField},
};

/// Catalog state: the unfiltered game list plus the current selection.
/// Every mutation goes through a named action; the view is recomputed on
/// each read.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    games: Vec<Game>,
    metadata: Metadata,
    last_updated: Option<String>,
    selection: Selection,
    loading: bool,
    error: Option<String>,
    selected_game: Option<usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selection(selection: Selection) -> Self {
        Self {
            selection,
            ..Self::default()
        }
    }

    pub fn games(&self) -> &[Game] {
        &self.games
    }

    pub fn last_updated(&self) -> Option<&str> {
        self.last_updated.as_deref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn known_sources(&self) -> Vec<String> {
        self.metadata.known_sources(&self.games)
    }

    pub fn known_platforms(&self) -> Vec<String> {
        known_platforms(&self.games)
    }

    pub fn view(&self) -> CatalogView<'_> {
        view::derive(&self.games, &self.selection)
    }

    pub fn filtered_games(&self) -> Vec<&Game> {
        self.view().games()
    }

    pub fn displayed_games_count(&self) -> usize {
        self.view().displayed_count
    }

    pub fn total_games_count(&self) -> usize {
        self.games.len()
    }

    pub fn should_deemphasize(&self, game: &Game) -> bool {
        view::should_deemphasize(game, &self.selection.platform)
    }

    pub fn begin_fetch(&mut self) {
        self.loading = true;
    }

    /// Applies a fetch outcome. A failure keeps the current games.
    pub fn finish_fetch(&mut self, result: Result<Manifest, FetchError>) {
        match result {
            Ok(manifest) => self.apply_manifest(manifest),
            Err(err) => self.record_failure(&err),
        }
    }

    pub fn fetch_games(&mut self, location: &ManifestLocation) -> Result<(), FetchError> {
        self.begin_fetch();
        match fetch_manifest(location) {
            Ok(manifest) => {
                self.apply_manifest(manifest);
                Ok(())
            }
            Err(err) => {
                self.record_failure(&err);
                Err(err)
            }
        }
    }

    /// The selected game follows its title into the new list; it is
    /// cleared when the title is gone.
    fn apply_manifest(&mut self, manifest: Manifest) {
        let selected_title = self.selected_game().map(|game| game.title.clone());
        self.last_updated = manifest.last_updated().map(str::to_string);
        self.games = manifest.games;
        self.metadata = manifest.metadata;
        self.error = None;
        self.selected_game = selected_title
            .and_then(|title| self.games.iter().position(|game| game.title == title));
        self.loading = false;
    }

    fn record_failure(&mut self, err: &FetchError) {
        self.error = Some(err.to_string());
        self.loading = false;
    }

    pub fn set_selected_platform(&mut self, platform: Filter) {
        self.selection.platform = platform;
    }

    pub fn set_selected_source(&mut self, source: Filter) {
        self.selected_game = None;
        self.selection.source = source;
    }

    /// Same field flips the direction; a new field starts ascending.
    pub fn set_sort_by(&mut self, field: SortField) {
        if self.selection.sort_by == field {
            self.selection.sort_direction = self.selection.sort_direction.toggled();
        } else {
            self.selection.sort_by = field;
            self.selection.sort_direction = SortDirection::Asc;
        }
    }

    pub fn set_sort_direction(&mut self, direction: SortDirection) {
        self.selection.sort_direction = direction;
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.selection.search_query = query.into();
    }

    pub fn set_selected_game(&mut self, index: usize) {
        self.selected_game = Some(index);
    }

    pub fn clear_selected_game(&mut self) {
        self.selected_game = None;
    }

    pub fn selected_game_index(&self) -> Option<usize> {
        self.selected_game
    }

    pub fn selected_game(&self) -> Option<&Game> {
        self.selected_game.and_then(|index| self.games.get(index))
    }
}
