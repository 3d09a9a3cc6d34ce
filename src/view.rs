use crate::game::{is_platform_supported, Game};
use std::{cmp::Ordering, fmt};

/// Rank given to games with no applicable ranking so they land last in
/// ascending order.
pub const UNRANKED: i64 = 999;

pub const ALL: &str = "all";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Filter {
    #[default]
    All,
    Only(String),
}

impl Filter {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == ALL {
            Filter::All
        } else {
            Filter::Only(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Filter::All => ALL,
            Filter::Only(id) => id,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortField {
    #[default]
    Rank,
    ReleaseDate,
    Name,
    HarmonyScore,
    Metacritic,
    TotalScore,
}

const SORT_FIELDS: [SortField; 6] = [
    SortField::Rank,
    SortField::ReleaseDate,
    SortField::Name,
    SortField::HarmonyScore,
    SortField::Metacritic,
    SortField::TotalScore,
];

impl SortField {
    pub fn all() -> &'static [SortField] {
        &SORT_FIELDS
    }

    pub fn key(self) -> &'static str {
        match self {
            SortField::Rank => "rank",
            SortField::ReleaseDate => "release_date",
            SortField::Name => "name",
            SortField::HarmonyScore => "harmony_score",
            SortField::Metacritic => "metacritic",
            SortField::TotalScore => "total_score",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortField::Rank => "Rank",
            SortField::ReleaseDate => "Release",
            SortField::Name => "Title",
            SortField::HarmonyScore => "Harmony",
            SortField::Metacritic => "Metacritic",
            SortField::TotalScore => "Total",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "rank" => Some(SortField::Rank),
            "release_date" | "release" | "date" => Some(SortField::ReleaseDate),
            "name" | "title" => Some(SortField::Name),
            "harmony_score" | "harmony" | "score" => Some(SortField::HarmonyScore),
            "metacritic" => Some(SortField::Metacritic),
            "total_score" | "total" => Some(SortField::TotalScore),
            _ => None,
        }
    }

    pub fn next(self, direction: i32) -> SortField {
        let total = SORT_FIELDS.len() as i32;
        let current = SORT_FIELDS
            .iter()
            .position(|field| *field == self)
            .unwrap_or(0) as i32;
        let step = if direction >= 0 { 1 } else { -1 };
        let next = (current + step).rem_euclid(total) as usize;
        SORT_FIELDS.get(next).copied().unwrap_or(self)
    }
}

/// `Asc` is the field's natural order (best rank, newest release, A to Z,
/// highest score first); `Desc` is its exact reverse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortDirection::Asc => "↑",
            SortDirection::Desc => "↓",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Selection {
    pub platform: Filter,
    pub source: Filter,
    pub sort_by: SortField,
    pub sort_direction: SortDirection,
    pub search_query: String,
}

impl Selection {
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("platform={}", self.platform),
            format!("source={}", self.source),
            format!("sort={} {}", self.sort_by.key(), self.sort_direction.label()),
        ];
        if !self.search_query.is_empty() {
            parts.push(format!("query=\"{}\"", self.search_query));
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewRow<'a> {
    /// Position in the unfiltered game list.
    pub index: usize,
    pub game: &'a Game,
    /// Rank from the manifest; `None` when the game has none to show.
    pub rank: Option<i64>,
    /// Rank used for sorting, `UNRANKED` when `rank` is `None`.
    pub effective_rank: i64,
    pub deemphasized: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogView<'a> {
    pub rows: Vec<ViewRow<'a>>,
    pub displayed_count: usize,
    pub total_count: usize,
}

impl<'a> CatalogView<'a> {
    pub fn games(&self) -> Vec<&'a Game> {
        self.rows.iter().map(|row| row.game).collect()
    }
}

pub fn derive<'a>(games: &'a [Game], selection: &Selection) -> CatalogView<'a> {
    let query = selection.search_query.to_lowercase();
    let mut rows: Vec<ViewRow<'a>> = games
        .iter()
        .enumerate()
        .filter(|(_, game)| query.is_empty() || game.title.to_lowercase().contains(&query))
        .filter(|(_, game)| match &selection.source {
            Filter::All => true,
            Filter::Only(source) => game.rankings.contains_key(source),
        })
        .map(|(index, game)| {
            let rank = applicable_rank(game, &selection.source);
            ViewRow {
                index,
                game,
                rank,
                effective_rank: rank.unwrap_or(UNRANKED),
                deemphasized: should_deemphasize(game, &selection.platform),
            }
        })
        .collect();

    rows.sort_by(|a, b| compare_rows(a, b, selection.sort_by));
    if selection.sort_direction == SortDirection::Desc {
        rows.reverse();
    }

    let displayed_count = rows
        .iter()
        .filter(|row| supports_platform(row.game, &selection.platform))
        .count();

    CatalogView {
        rows,
        displayed_count,
        total_count: games.len(),
    }
}

pub fn applicable_rank(game: &Game, source: &Filter) -> Option<i64> {
    match source {
        Filter::All => game.best_rank(),
        Filter::Only(source) => game.rank_for(source),
    }
}

pub fn rank_label(rank: Option<i64>) -> String {
    rank.map_or_else(|| "-".to_string(), |rank| rank.to_string())
}

pub fn supports_platform(game: &Game, platform: &Filter) -> bool {
    match platform {
        Filter::All => true,
        Filter::Only(platform) => is_platform_supported(game, platform),
    }
}

/// Rendering hint only; deemphasized games stay in the list.
pub fn should_deemphasize(game: &Game, platform: &Filter) -> bool {
    !supports_platform(game, platform)
}

fn compare_rows(a: &ViewRow<'_>, b: &ViewRow<'_>, field: SortField) -> Ordering {
    match field {
        SortField::Rank => a.effective_rank.cmp(&b.effective_rank),
        SortField::ReleaseDate => b.game.release_date.cmp(&a.game.release_date),
        SortField::Name => compare_titles(&a.game.title, &b.game.title),
        SortField::HarmonyScore => compare_scores(a.game.harmony_score, b.game.harmony_score),
        SortField::Metacritic => compare_scores(a.game.metacritic, b.game.metacritic),
        SortField::TotalScore => compare_scores(a.game.total_score, b.game.total_score),
    }
}

fn compare_titles(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn compare_scores(a: Option<f64>, b: Option<f64>) -> Ordering {
    let a = a.unwrap_or(0.0);
    let b = b.unwrap_or(0.0);
    b.total_cmp(&a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{tests::game, PlatformSupport};
    use std::collections::HashSet;
    use time::{Date, Month};

    fn titles(view: &CatalogView<'_>) -> Vec<String> {
        view.rows.iter().map(|row| row.game.title.clone()).collect()
    }

    fn selection() -> Selection {
        Selection::default()
    }

    fn sample() -> Vec<Game> {
        let mut zelda = game("The Legend of Zelda", &[("gog", 3), ("steam", 1)]);
        zelda.release_date = Date::from_calendar_date(1986, Month::February, 21).ok();
        zelda.metacritic = Some(84.0);
        zelda
            .platforms
            .insert("switch".to_string(), PlatformSupport::Flag(true));

        let mut hades = game("Hades", &[("gog", 1)]);
        hades.release_date = Date::from_calendar_date(2020, Month::September, 17).ok();
        hades.metacritic = Some(93.0);
        hades.harmony_score = Some(97.0);
        hades
            .platforms
            .insert("steamdeck".to_string(), PlatformSupport::Tier("verified".to_string()));

        let mut celeste = game("celeste", &[("steam", 4)]);
        celeste.release_date = Date::from_calendar_date(2018, Month::January, 25).ok();
        celeste
            .platforms
            .insert("steamdeck".to_string(), PlatformSupport::Tier("playable".to_string()));

        let unranked = game("Obscure", &[]);

        vec![zelda, hades, celeste, unranked]
    }

    #[test]
    fn source_scenario_filters_to_ranked_games() {
        let games = vec![game("A", &[("gog", 1)]), game("B", &[("steam", 2)])];
        let mut selection = selection();
        selection.source = Filter::Only("gog".to_string());
        let view = derive(&games, &selection);
        assert_eq!(titles(&view), vec!["A"]);
        assert_eq!(view.displayed_count, 1);
        assert_eq!(view.total_count, 2);
    }

    #[test]
    fn filtered_games_are_a_subset_without_duplicates() {
        let games = sample();
        let selections = [
            Selection::default(),
            Selection {
                source: Filter::Only("steam".to_string()),
                sort_by: SortField::Name,
                ..Selection::default()
            },
            Selection {
                platform: Filter::Only("steamdeck".to_string()),
                sort_by: SortField::Metacritic,
                sort_direction: SortDirection::Desc,
                search_query: "e".to_string(),
                ..Selection::default()
            },
            Selection {
                source: Filter::Only("nowhere".to_string()),
                ..Selection::default()
            },
        ];
        for selection in selections {
            let view = derive(&games, &selection);
            let indices: HashSet<usize> = view.rows.iter().map(|row| row.index).collect();
            assert_eq!(indices.len(), view.rows.len());
            for row in &view.rows {
                assert_eq!(&games[row.index], row.game);
            }
        }
    }

    #[test]
    fn derivation_is_idempotent() {
        let games = sample();
        let selection = Selection {
            sort_by: SortField::ReleaseDate,
            ..Selection::default()
        };
        let first = derive(&games, &selection);
        let second = derive(&games, &selection);
        assert_eq!(first, second);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let games = sample();
        let selection = Selection {
            search_query: "zelda".to_string(),
            ..Selection::default()
        };
        assert_eq!(titles(&derive(&games, &selection)), vec!["The Legend of Zelda"]);

        let selection = Selection {
            search_query: "CELE".to_string(),
            ..Selection::default()
        };
        assert_eq!(titles(&derive(&games, &selection)), vec!["celeste"]);
    }

    #[test]
    fn search_query_is_not_trimmed() {
        let games = vec![
            game("Offworld", &[("gog", 1)]),
            game("Lord of the Rings", &[("gog", 2)]),
        ];
        let selection = Selection {
            search_query: "of ".to_string(),
            ..Selection::default()
        };
        assert_eq!(titles(&derive(&games, &selection)), vec!["Lord of the Rings"]);

        let selection = Selection {
            search_query: " ".to_string(),
            ..Selection::default()
        };
        assert_eq!(titles(&derive(&games, &selection)), vec!["Lord of the Rings"]);
    }

    #[test]
    fn rank_sort_uses_best_rank_and_sentinel() {
        let games = sample();
        let view = derive(&games, &selection());
        assert_eq!(
            titles(&view),
            vec!["The Legend of Zelda", "Hades", "celeste", "Obscure"]
        );
        assert_eq!(view.rows[3].effective_rank, UNRANKED);
        assert_eq!(view.rows[3].rank, None);
    }

    #[test]
    fn real_rank_of_999_is_still_a_rank() {
        let games = vec![game("Deep Cut", &[("gog", 999)]), game("Unlisted", &[])];
        let view = derive(&games, &selection());
        assert_eq!(view.rows[0].effective_rank, UNRANKED);
        assert_eq!(view.rows[0].rank, Some(999));
        assert_eq!(rank_label(view.rows[0].rank), "999");
        assert_eq!(view.rows[1].rank, None);
        assert_eq!(rank_label(view.rows[1].rank), "-");
    }

    #[test]
    fn rank_sort_uses_selected_source() {
        let games = sample();
        let selection = Selection {
            source: Filter::Only("gog".to_string()),
            ..Selection::default()
        };
        let view = derive(&games, &selection);
        assert_eq!(titles(&view), vec!["Hades", "The Legend of Zelda"]);
        assert_eq!(view.rows[1].effective_rank, 3);
    }

    #[test]
    fn ranked_games_sort_before_unranked_ones() {
        let games = vec![game("Unranked", &[]), game("Ranked", &[("gog", 1200)])];
        let view = derive(&games, &selection());
        assert_eq!(titles(&view), vec!["Ranked", "Unranked"]);
    }

    #[test]
    fn release_date_sorts_newest_first() {
        let games = sample();
        let selection = Selection {
            sort_by: SortField::ReleaseDate,
            ..Selection::default()
        };
        assert_eq!(
            titles(&derive(&games, &selection)),
            vec!["Hades", "celeste", "The Legend of Zelda", "Obscure"]
        );
    }

    #[test]
    fn name_sort_ignores_case_first() {
        let games = sample();
        let selection = Selection {
            sort_by: SortField::Name,
            ..Selection::default()
        };
        assert_eq!(
            titles(&derive(&games, &selection)),
            vec!["celeste", "Hades", "Obscure", "The Legend of Zelda"]
        );
    }

    #[test]
    fn score_sort_treats_missing_as_zero() {
        let games = sample();
        let selection = Selection {
            sort_by: SortField::Metacritic,
            ..Selection::default()
        };
        assert_eq!(
            titles(&derive(&games, &selection)),
            vec!["Hades", "The Legend of Zelda", "celeste", "Obscure"]
        );
    }

    #[test]
    fn descending_is_exact_reverse_including_ties() {
        let games = sample();
        let asc = Selection {
            sort_by: SortField::HarmonyScore,
            ..Selection::default()
        };
        let desc = Selection {
            sort_direction: SortDirection::Desc,
            ..asc.clone()
        };
        let mut forward = titles(&derive(&games, &asc));
        forward.reverse();
        assert_eq!(forward, titles(&derive(&games, &desc)));
    }

    #[test]
    fn platform_only_affects_count_and_hint() {
        let games = sample();
        let selection = Selection {
            platform: Filter::Only("steamdeck".to_string()),
            ..Selection::default()
        };
        let view = derive(&games, &selection);
        assert_eq!(view.rows.len(), 4);
        assert_eq!(view.displayed_count, 1);
        let dimmed: Vec<&str> = view
            .rows
            .iter()
            .filter(|row| row.deemphasized)
            .map(|row| row.game.title.as_str())
            .collect();
        assert_eq!(dimmed, vec!["The Legend of Zelda", "celeste", "Obscure"]);
    }

    #[test]
    fn unknown_platform_matches_nothing() {
        let games = sample();
        let selection = Selection {
            platform: Filter::Only("dreamcast".to_string()),
            ..Selection::default()
        };
        let view = derive(&games, &selection);
        assert_eq!(view.displayed_count, 0);
        assert!(view.rows.iter().all(|row| row.deemphasized));
    }

    #[test]
    fn all_platform_never_deemphasizes() {
        let games = sample();
        let view = derive(&games, &selection());
        assert_eq!(view.displayed_count, games.len());
        assert!(view.rows.iter().all(|row| !row.deemphasized));
    }

    #[test]
    fn derive_leaves_input_untouched() {
        let games = sample();
        let before = games.clone();
        let selection = Selection {
            sort_by: SortField::Name,
            sort_direction: SortDirection::Desc,
            ..Selection::default()
        };
        let _ = derive(&games, &selection);
        assert_eq!(games, before);
    }

    #[test]
    fn sort_field_cycles_both_ways() {
        assert_eq!(SortField::Rank.next(1), SortField::ReleaseDate);
        assert_eq!(SortField::Rank.next(-1), SortField::TotalScore);
        assert_eq!(SortField::TotalScore.next(1), SortField::Rank);
        assert_eq!(SortField::parse("Title"), Some(SortField::Name));
        assert_eq!(SortField::parse("stars"), None);
    }

    #[test]
    fn filter_parses_all() {
        assert_eq!(Filter::parse("all"), Filter::All);
        assert_eq!(Filter::parse(""), Filter::All);
        assert_eq!(Filter::parse("gog"), Filter::Only("gog".to_string()));
    }
}
