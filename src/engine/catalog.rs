//! Stat-name resolution.
//!
//! Maps human stat names ("points", "PTS", "pts + reb + ast", "PRA", "rec yds")
//! onto the canonical stat-line columns of one sport. Unknown names are an
//! error, never a guess.

use serde::Serialize;

use super::error::EngineError;
use crate::db::models::Sport;

/// How a multi-column stat folds its columns into one value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
}

/// A resolved stat: canonical id plus the ordered columns it aggregates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatSpec {
    pub id: String,
    pub label: String,
    pub sport: Sport,
    /// Never empty; more than one column makes this a combo
    pub columns: Vec<String>,
    pub aggregation: Aggregation,
}

impl StatSpec {
    pub fn is_combo(&self) -> bool {
        self.columns.len() > 1
    }

    /// Points or made shots are involved, so shot volume is relevant.
    pub fn is_scoring(&self) -> bool {
        self.sport == Sport::Basketball
            && self
                .columns
                .iter()
                .any(|c| matches!(c.as_str(), "pts" | "fgm" | "fg3m" | "ftm"))
    }

    /// Single-column spec for an auxiliary column (minutes, shot attempts).
    pub fn column(sport: Sport, column: &str, label: &str) -> StatSpec {
        StatSpec {
            id: column.to_string(),
            label: label.to_string(),
            sport,
            columns: vec![column.to_string()],
            aggregation: Aggregation::Sum,
        }
    }
}

struct StatDef {
    id: &'static str,
    label: &'static str,
    aliases: &'static [&'static str],
}

struct ComboDef {
    id: &'static str,
    columns: &'static [&'static str],
    aliases: &'static [&'static str],
}

// Catalog order doubles as the canonical column order of ad hoc combos.
const BASKETBALL_STATS: &[StatDef] = &[
    StatDef { id: "pts", label: "points", aliases: &["points", "point", "p"] },
    StatDef { id: "reb", label: "rebounds", aliases: &["rebounds", "rebs", "r", "trb", "total rebounds"] },
    StatDef { id: "ast", label: "assists", aliases: &["assists", "asts", "a"] },
    StatDef { id: "stl", label: "steals", aliases: &["steals", "steal"] },
    StatDef { id: "blk", label: "blocks", aliases: &["blocks", "blks", "block"] },
    StatDef { id: "tov", label: "turnovers", aliases: &["turnovers", "to", "tos"] },
    StatDef { id: "fg3m", label: "threes made", aliases: &["threes", "3pm", "3s", "3pt made", "threes made", "three pointers made", "3-pointers made"] },
    StatDef { id: "fg3a", label: "three-point attempts", aliases: &["3pa", "three point attempts", "3pt attempts"] },
    StatDef { id: "fgm", label: "field goals made", aliases: &["field goals made", "fg made"] },
    StatDef { id: "fga", label: "field goal attempts", aliases: &["field goal attempts", "fg attempts", "shot attempts"] },
    StatDef { id: "ftm", label: "free throws made", aliases: &["free throws made", "ft made", "free throws"] },
    StatDef { id: "fta", label: "free throw attempts", aliases: &["free throw attempts", "ft attempts"] },
    StatDef { id: "oreb", label: "offensive rebounds", aliases: &["offensive rebounds", "off reb"] },
    StatDef { id: "dreb", label: "defensive rebounds", aliases: &["defensive rebounds", "def reb"] },
];

const BASKETBALL_COMBOS: &[ComboDef] = &[
    ComboDef { id: "pra", columns: &["pts", "reb", "ast"], aliases: &["pras", "p+r+a", "points+rebounds+assists"] },
    ComboDef { id: "pr", columns: &["pts", "reb"], aliases: &["p+r", "points+rebounds"] },
    ComboDef { id: "pa", columns: &["pts", "ast"], aliases: &["p+a", "points+assists"] },
    ComboDef { id: "ra", columns: &["reb", "ast"], aliases: &["r+a", "rebounds+assists"] },
    ComboDef { id: "stocks", columns: &["stl", "blk"], aliases: &["steals+blocks", "blocks+steals", "stl+blk"] },
];

const FOOTBALL_STATS: &[StatDef] = &[
    StatDef { id: "passing_yards", label: "passing yards", aliases: &["passing yards", "pass yds", "pass yards", "pass_yds"] },
    StatDef { id: "passing_tds", label: "passing touchdowns", aliases: &["passing touchdowns", "passing tds", "pass tds"] },
    StatDef { id: "completions", label: "completions", aliases: &["pass completions", "cmp"] },
    StatDef { id: "pass_attempts", label: "pass attempts", aliases: &["passing attempts", "pass att"] },
    StatDef { id: "interceptions", label: "interceptions", aliases: &["ints", "int", "interceptions thrown"] },
    StatDef { id: "rushing_yards", label: "rushing yards", aliases: &["rushing yards", "rush yds", "rush yards", "rush_yds"] },
    StatDef { id: "rushing_attempts", label: "rushing attempts", aliases: &["carries", "rush attempts", "rush att"] },
    StatDef { id: "rushing_tds", label: "rushing touchdowns", aliases: &["rushing touchdowns", "rushing tds", "rush tds"] },
    StatDef { id: "receptions", label: "receptions", aliases: &["rec", "catches"] },
    StatDef { id: "targets", label: "targets", aliases: &["tgt"] },
    StatDef { id: "receiving_yards", label: "receiving yards", aliases: &["receiving yards", "rec yds", "rec yards", "rec_yds"] },
    StatDef { id: "receiving_tds", label: "receiving touchdowns", aliases: &["receiving touchdowns", "receiving tds", "rec tds"] },
];

const FOOTBALL_COMBOS: &[ComboDef] = &[
    ComboDef { id: "rush_rec_yards", columns: &["rushing_yards", "receiving_yards"], aliases: &["rush+rec yds", "rush+rec yards", "rushing+receiving yards", "rush_rec_yds"] },
    ComboDef { id: "pass_rush_yards", columns: &["passing_yards", "rushing_yards"], aliases: &["pass+rush yds", "pass+rush yards", "passing+rushing yards"] },
    ComboDef { id: "rush_rec_tds", columns: &["rushing_tds", "receiving_tds"], aliases: &["rush+rec tds", "rushing+receiving touchdowns"] },
];

/// Per-sport stat catalog
#[derive(Clone, Copy)]
pub struct StatCatalog {
    sport: Sport,
    stats: &'static [StatDef],
    combos: &'static [ComboDef],
}

impl StatCatalog {
    pub fn for_sport(sport: Sport) -> Self {
        match sport {
            Sport::Basketball => StatCatalog {
                sport,
                stats: BASKETBALL_STATS,
                combos: BASKETBALL_COMBOS,
            },
            Sport::Football => StatCatalog {
                sport,
                stats: FOOTBALL_STATS,
                combos: FOOTBALL_COMBOS,
            },
        }
    }

    /// Resolve a stat name. Case, surrounding whitespace and spacing around
    /// `+`/`/` are ignored.
    pub fn resolve(&self, name: &str) -> Result<StatSpec, EngineError> {
        let key = normalize_name(name);
        if key.is_empty() {
            return Err(EngineError::MissingIdentifier("stat"));
        }

        if let Some(def) = self.find_single(&key) {
            return Ok(self.single_spec(def));
        }
        if let Some(combo) = self.find_combo(&key) {
            return Ok(self.combo_spec(combo));
        }
        if key.contains('+') {
            return self.resolve_ad_hoc(name, &key);
        }
        Err(EngineError::UnsupportedStat(name.trim().to_string()))
    }

    /// Every named stat, singles first.
    pub fn list(&self) -> Vec<StatSpec> {
        self.stats
            .iter()
            .map(|d| self.single_spec(d))
            .chain(self.combos.iter().map(|c| self.combo_spec(c)))
            .collect()
    }

    fn find_single(&self, key: &str) -> Option<&'static StatDef> {
        self.stats
            .iter()
            .find(|d| d.id == key || d.aliases.contains(&key))
    }

    fn find_combo(&self, key: &str) -> Option<&'static ComboDef> {
        self.combos.iter().find(|c| {
            c.id == key || c.aliases.contains(&key) || c.columns.join("+") == key
        })
    }

    /// "reb+pts", "pts/ast/stl": every part must be a known single stat.
    fn resolve_ad_hoc(&self, name: &str, key: &str) -> Result<StatSpec, EngineError> {
        let mut positions = Vec::new();
        for part in key.split('+') {
            let def = self
                .find_single(part)
                .ok_or_else(|| EngineError::UnsupportedStat(name.trim().to_string()))?;
            let pos = self.stats.iter().position(|d| d.id == def.id).unwrap_or(0);
            if !positions.contains(&pos) {
                positions.push(pos);
            }
        }
        if positions.len() < 2 {
            return Err(EngineError::UnsupportedStat(name.trim().to_string()));
        }
        positions.sort_unstable();
        let columns: Vec<&'static str> = positions.iter().map(|&i| self.stats[i].id).collect();

        if let Some(named) = self.combos.iter().find(|c| c.columns == columns.as_slice()) {
            return Ok(self.combo_spec(named));
        }
        Ok(StatSpec {
            id: columns.join("+"),
            label: positions
                .iter()
                .map(|&i| self.stats[i].label)
                .collect::<Vec<_>>()
                .join(" + "),
            sport: self.sport,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            aggregation: Aggregation::Sum,
        })
    }

    fn single_spec(&self, def: &StatDef) -> StatSpec {
        StatSpec::column(self.sport, def.id, def.label)
    }

    fn combo_spec(&self, combo: &ComboDef) -> StatSpec {
        let label = combo
            .columns
            .iter()
            .map(|c| {
                self.stats
                    .iter()
                    .find(|d| d.id == *c)
                    .map(|d| d.label)
                    .unwrap_or(*c)
            })
            .collect::<Vec<_>>()
            .join(" + ");
        StatSpec {
            id: combo.id.to_string(),
            label,
            sport: self.sport,
            columns: combo.columns.iter().map(|c| c.to_string()).collect(),
            aggregation: Aggregation::Sum,
        }
    }
}

/// Lowercase, collapse whitespace, strip spaces around separators and
/// fold `/` and `&` into `+`.
fn normalize_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase().replace(['/', '&'], "+");
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .split('+')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("+")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nba() -> StatCatalog {
        StatCatalog::for_sport(Sport::Basketball)
    }

    #[test]
    fn test_resolve_is_case_and_whitespace_insensitive() {
        for name in ["points", "  POINTS ", "Pts", "pts", "p"] {
            let spec = nba().resolve(name).unwrap();
            assert_eq!(spec.id, "pts");
            assert_eq!(spec.columns, vec!["pts"]);
            assert!(!spec.is_combo());
        }
    }

    #[test]
    fn test_named_and_spelled_out_combos_agree() {
        let expected = nba().resolve("pra").unwrap();
        for name in ["PRAS", "pts+reb+ast", "Pts + Reb + Ast", "pts/reb/ast", "points + rebounds + assists"] {
            assert_eq!(nba().resolve(name).unwrap(), expected, "{}", name);
        }
        assert_eq!(expected.columns, vec!["pts", "reb", "ast"]);
        assert!(expected.is_combo());
    }

    #[test]
    fn test_ad_hoc_combo_uses_catalog_order() {
        let spec = nba().resolve("ast + pts").unwrap();
        assert_eq!(spec.id, "pa");
        let spec = nba().resolve("blk+tov+reb").unwrap();
        assert_eq!(spec.id, "reb+blk+tov");
        assert_eq!(spec.columns, vec!["reb", "blk", "tov"]);
        assert_eq!(spec.label, "rebounds + blocks + turnovers");
    }

    #[test]
    fn test_unknown_names_fail() {
        for name in ["blorp", "pts+blorp", "pts+pts", "passing yards"] {
            match nba().resolve(name) {
                Err(EngineError::UnsupportedStat(_)) => {}
                other => panic!("expected UnsupportedStat for {}, got {:?}", name, other),
            }
        }
        assert!(matches!(
            nba().resolve("   "),
            Err(EngineError::MissingIdentifier("stat"))
        ));
    }

    #[test]
    fn test_football_aliases() {
        let nfl = StatCatalog::for_sport(Sport::Football);
        assert_eq!(nfl.resolve("Rec Yds").unwrap().id, "receiving_yards");
        assert_eq!(nfl.resolve("receiving_yards").unwrap().id, "receiving_yards");
        let combo = nfl.resolve("rush+rec yds").unwrap();
        assert_eq!(combo.columns, vec!["rushing_yards", "receiving_yards"]);
        assert_eq!(nfl.resolve("rush yds + rec yds").unwrap(), combo);
        assert!(nfl.resolve("points").is_err());
    }

    #[test]
    fn test_every_listed_stat_resolves_to_itself() {
        for sport in [Sport::Basketball, Sport::Football] {
            let catalog = StatCatalog::for_sport(sport);
            for spec in catalog.list() {
                assert_eq!(catalog.resolve(&spec.id).unwrap(), spec);
                assert!(!spec.columns.is_empty());
            }
        }
    }

    #[test]
    fn test_scoring_flag() {
        assert!(nba().resolve("pra").unwrap().is_scoring());
        assert!(nba().resolve("threes").unwrap().is_scoring());
        assert!(!nba().resolve("rebounds").unwrap().is_scoring());
    }
}
