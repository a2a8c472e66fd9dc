//! Column selection and rename tables per entity kind.
//!
//! The selection is an allowlist: source fields not listed here are dropped.
//! The first column of each table is its key column.

use super::kind::EntityKind;
use super::table::ColumnDef;
use super::table::ColumnType::{Bool, Integer, Json, Real, Text, Timestamp};

const POSITIONS: &[ColumnDef] = &[
    ColumnDef::renamed("id", "pos_id", Integer),
    ColumnDef::same("plural_name", Text),
    ColumnDef::same("singular_name", Text),
    ColumnDef::renamed("singular_name_short", "position_name", Text),
    ColumnDef::same("element_count", Integer),
];

const TEAMS: &[ColumnDef] = &[
    ColumnDef::renamed("id", "team_id", Integer),
    ColumnDef::same("code", Integer),
    ColumnDef::renamed("name", "team_name", Text),
    ColumnDef::renamed("short_name", "team_short_name", Text),
    ColumnDef::same("win", Integer),
    ColumnDef::same("draw", Integer),
    ColumnDef::same("loss", Integer),
    ColumnDef::same("played", Integer),
    ColumnDef::same("points", Integer),
    ColumnDef::same("position", Integer),
    ColumnDef::same("strength", Integer),
    ColumnDef::same("strength_overall_home", Integer),
    ColumnDef::same("strength_overall_away", Integer),
    ColumnDef::same("strength_attack_home", Integer),
    ColumnDef::same("strength_attack_away", Integer),
    ColumnDef::same("strength_defence_home", Integer),
    ColumnDef::same("strength_defence_away", Integer),
];

const GAMEWEEKS: &[ColumnDef] = &[
    ColumnDef::renamed("id", "gameweek_id", Integer),
    ColumnDef::same("name", Text),
    ColumnDef::same("deadline_time", Timestamp),
    ColumnDef::same("deadline_time_epoch", Integer),
    ColumnDef::same("average_entry_score", Integer),
    ColumnDef::same("finished", Bool),
    ColumnDef::same("data_checked", Bool),
    ColumnDef::same("highest_score", Integer),
    ColumnDef::same("ranked_count", Integer),
    ColumnDef::same("chip_plays", Json),
    ColumnDef::same("most_selected", Integer),
    ColumnDef::same("most_transferred_in", Integer),
    ColumnDef::renamed("top_element", "top_player", Integer),
    ColumnDef::renamed("top_element_info", "top_player_info", Json),
    ColumnDef::same("transfers_made", Integer),
    ColumnDef::same("most_captained", Integer),
    ColumnDef::same("most_vice_captained", Integer),
];

const PLAYERS: &[ColumnDef] = &[
    ColumnDef::renamed("id", "player_id", Integer),
    ColumnDef::same("first_name", Text),
    ColumnDef::same("second_name", Text),
    ColumnDef::same("web_name", Text),
    ColumnDef::renamed("code", "player_code", Integer),
    ColumnDef::renamed("element_type", "pos_id", Integer),
    ColumnDef::same("event_points", Integer),
    ColumnDef::same("total_points", Integer),
    ColumnDef::renamed("minutes", "minutes_played", Integer),
    ColumnDef::same("selected_by_percent", Real),
    ColumnDef::same("form", Real),
    ColumnDef::same("photo", Text),
    ColumnDef::same("points_per_game", Real),
    ColumnDef::same("status", Text),
    ColumnDef::renamed("team", "team_id", Integer),
    ColumnDef::same("team_code", Integer),
    ColumnDef::same("region", Integer),
    ColumnDef::same("goals_scored", Integer),
    ColumnDef::same("goals_conceded", Integer),
    ColumnDef::same("assists", Integer),
    ColumnDef::same("clean_sheets", Integer),
    ColumnDef::same("own_goals", Integer),
    ColumnDef::same("penalties_saved", Integer),
    ColumnDef::same("penalties_missed", Integer),
    ColumnDef::same("yellow_cards", Integer),
    ColumnDef::same("red_cards", Integer),
    ColumnDef::same("saves", Integer),
    ColumnDef::renamed("bonus", "total_bonus_pts", Integer),
    ColumnDef::same("bps", Integer),
    ColumnDef::same("influence", Real),
    ColumnDef::same("creativity", Real),
    ColumnDef::same("threat", Real),
    ColumnDef::same("ict_index", Real),
    ColumnDef::same("starts", Integer),
    ColumnDef::same("expected_goals", Real),
    ColumnDef::same("expected_assists", Real),
    ColumnDef::same("expected_goal_involvements", Real),
    ColumnDef::same("expected_goals_conceded", Real),
];

const FIXTURES: &[ColumnDef] = &[
    ColumnDef::parent("player_id"),
    ColumnDef::renamed("id", "fixture_id", Integer),
    ColumnDef::same("code", Integer),
    ColumnDef::same("team_h", Integer),
    ColumnDef::same("team_h_score", Integer),
    ColumnDef::same("team_a", Integer),
    ColumnDef::same("team_a_score", Integer),
    ColumnDef::same("event", Integer),
    ColumnDef::same("finished", Bool),
    ColumnDef::same("minutes", Integer),
    ColumnDef::same("provisional_start_time", Bool),
    ColumnDef::same("kickoff_time", Timestamp),
    ColumnDef::same("event_name", Text),
    ColumnDef::same("is_home", Bool),
    ColumnDef::same("difficulty", Integer),
];

const HISTORY_HEAD: &[ColumnDef] = &[
    ColumnDef::renamed("element", "player_id", Integer),
    ColumnDef::renamed("fixture", "fixture_id", Integer),
    ColumnDef::same("opponent_team", Integer),
    ColumnDef::same("total_points", Integer),
    ColumnDef::same("was_home", Bool),
    ColumnDef::same("kickoff_time", Timestamp),
    ColumnDef::same("team_h_score", Integer),
    ColumnDef::same("team_a_score", Integer),
    ColumnDef::same("round", Integer),
];

const HISTORY_TAIL: &[ColumnDef] = &[
    ColumnDef::same("value", Integer),
    ColumnDef::same("transfers_balance", Integer),
    ColumnDef::same("selected", Integer),
    ColumnDef::same("transfers_in", Integer),
    ColumnDef::same("transfers_out", Integer),
];

const HISTORY_PAST_HEAD: &[ColumnDef] = &[
    ColumnDef::same("element_code", Integer),
    ColumnDef::same("season_name", Text),
    ColumnDef::same("start_cost", Integer),
    ColumnDef::same("end_cost", Integer),
    ColumnDef::same("total_points", Integer),
];

/// Per-match stat block shared by `history` and `history_past`.
const MATCH_STATS: &[ColumnDef] = &[
    ColumnDef::same("minutes", Integer),
    ColumnDef::same("goals_scored", Integer),
    ColumnDef::same("assists", Integer),
    ColumnDef::same("clean_sheets", Integer),
    ColumnDef::same("goals_conceded", Integer),
    ColumnDef::same("own_goals", Integer),
    ColumnDef::same("penalties_saved", Integer),
    ColumnDef::same("penalties_missed", Integer),
    ColumnDef::same("yellow_cards", Integer),
    ColumnDef::same("red_cards", Integer),
    ColumnDef::same("saves", Integer),
    ColumnDef::same("bonus", Integer),
    ColumnDef::same("bps", Integer),
    ColumnDef::same("influence", Real),
    ColumnDef::same("creativity", Real),
    ColumnDef::same("threat", Real),
    ColumnDef::same("ict_index", Real),
    ColumnDef::same("starts", Integer),
    ColumnDef::same("expected_goals", Real),
    ColumnDef::same("expected_assists", Real),
    ColumnDef::same("expected_goal_involvements", Real),
    ColumnDef::same("expected_goals_conceded", Real),
];

/// Ordered column definitions for `kind`.
#[must_use]
pub fn columns(kind: EntityKind) -> Vec<ColumnDef> {
    match kind {
        EntityKind::Positions => POSITIONS.to_vec(),
        EntityKind::Teams => TEAMS.to_vec(),
        EntityKind::Gameweeks => GAMEWEEKS.to_vec(),
        EntityKind::Players => PLAYERS.to_vec(),
        EntityKind::Fixtures => FIXTURES.to_vec(),
        EntityKind::History => [HISTORY_HEAD, MATCH_STATS, HISTORY_TAIL].concat(),
        EntityKind::HistoryPast => [HISTORY_PAST_HEAD, MATCH_STATS].concat(),
    }
}

/// Default change-sensitive columns (target names) for `kind`.
///
/// Append-only kinds have none: they are never diffed.
#[must_use]
pub const fn change_columns(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Positions => &["position_name", "element_count"],
        EntityKind::Teams => &["team_name", "team_short_name", "strength"],
        EntityKind::Gameweeks => &[
            "average_entry_score",
            "finished",
            "data_checked",
            "highest_score",
        ],
        EntityKind::Players => &["event_points", "total_points", "status", "team_id"],
        EntityKind::Fixtures | EntityKind::History | EntityKind::HistoryPast => &[],
    }
}
