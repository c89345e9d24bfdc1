//! Vote tallying: turn raw ballot rows into a structured outcome.
//!
//! Two voting modes exist and never mix within one decision:
//!
//! * **Roll call**: one row per member present, each counting 1, keyed by
//!   the member's name.
//! * **Bloc**: one row per party, counting the party's seat weight, keyed by
//!   the party abbreviation.
//!
//! The mode is taken from the rows themselves: if any row names an
//! individual member the whole set is tallied as a roll call.
//!
//! Whether the motion carried (`for > against`) is left to the caller; ties
//! and quorum rules are not decided here.

use crate::error::TallyError;
use crate::store::BallotStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// How a ballot was cast.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Stance {
    For,
    Against,
    /// Abstained or did not take part.
    Abstained,
    /// Any other label. Ignored by the tally.
    Other(String),
}

impl From<&str> for Stance {
    /// Case-insensitive; spaces, `_` and `-` are ignored, so
    /// `notParticipated`, `not_participated` and `Niet deelgenomen` all match.
    fn from(s: &str) -> Self {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "for" | "voor" => Stance::For,
            "against" | "tegen" => Stance::Against,
            "abstained" | "notparticipated" | "nietdeelgenomen" => Stance::Abstained,
            _ => Stance::Other(s.to_string()),
        }
    }
}

impl From<String> for Stance {
    fn from(s: String) -> Self {
        Stance::from(s.as_str())
    }
}

impl From<Stance> for String {
    fn from(s: Stance) -> Self {
        s.to_string()
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stance::For => f.write_str("for"),
            Stance::Against => f.write_str("against"),
            Stance::Abstained => f.write_str("abstained"),
            Stance::Other(label) => f.write_str(label),
        }
    }
}

/// One raw vote record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub decision_id: String,
    /// Individual member name; present only in roll-call votes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
    /// Party abbreviation.
    #[serde(default)]
    pub party: String,
    pub stance: Stance,
    /// Seats held by the party; only meaningful for bloc votes.
    #[serde(default)]
    pub seat_weight: u32,
}

impl Ballot {
    /// A bloc ballot cast by `party` with `seats` seats.
    pub fn party(decision_id: &str, party: &str, stance: Stance, seats: u32) -> Self {
        Self {
            decision_id: decision_id.to_string(),
            member: None,
            party: party.to_string(),
            stance,
            seat_weight: seats,
        }
    }

    /// A roll-call ballot cast by one member.
    pub fn member(decision_id: &str, name: &str, party: &str, stance: Stance) -> Self {
        Self {
            decision_id: decision_id.to_string(),
            member: Some(name.to_string()),
            party: party.to_string(),
            stance,
            seat_weight: 1,
        }
    }

    fn member_name(&self) -> Option<&str> {
        self.member
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteMode {
    RollCall,
    Bloc,
}

/// Aggregated outcome of one decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteResult {
    pub mode: VoteMode,
    pub for_set: BTreeSet<String>,
    pub against_set: BTreeSet<String>,
    pub abstained_set: BTreeSet<String>,
    pub for_count: u64,
    pub against_count: u64,
    pub abstained_count: u64,
}

impl VoteResult {
    fn empty(mode: VoteMode) -> Self {
        Self {
            mode,
            for_set: BTreeSet::new(),
            against_set: BTreeSet::new(),
            abstained_set: BTreeSet::new(),
            for_count: 0,
            against_count: 0,
            abstained_count: 0,
        }
    }

    /// Total weight of all counted ballots.
    pub fn total(&self) -> u64 {
        self.for_count + self.against_count + self.abstained_count
    }
}

/// Tally a decision's ballots. `None` when there are none.
///
/// In a roll call, a row without a member name counts once under its party
/// abbreviation.
pub fn tally_ballots(ballots: &[Ballot]) -> Option<VoteResult> {
    if ballots.is_empty() {
        return None;
    }

    let mode = if ballots.iter().any(|b| b.member_name().is_some()) {
        VoteMode::RollCall
    } else {
        VoteMode::Bloc
    };
    let mut result = VoteResult::empty(mode);

    for b in ballots {
        let (caster, weight) = match mode {
            VoteMode::RollCall => (b.member_name().unwrap_or(b.party.as_str()), 1),
            VoteMode::Bloc => (b.party.as_str(), u64::from(b.seat_weight)),
        };
        let (set, count) = match b.stance {
            Stance::For => (&mut result.for_set, &mut result.for_count),
            Stance::Against => (&mut result.against_set, &mut result.against_count),
            Stance::Abstained => (&mut result.abstained_set, &mut result.abstained_count),
            Stance::Other(ref label) => {
                debug!("Ignoring ballot with stance '{}'", label);
                continue;
            }
        };
        *count += weight;
        if !caster.is_empty() {
            set.insert(caster.to_string());
        }
    }

    Some(result)
}

/// Fetches ballots from a [`BallotStore`] and tallies them.
#[derive(Clone)]
pub struct VoteTallyAggregator {
    store: Arc<dyn BallotStore>,
}

impl VoteTallyAggregator {
    pub fn new(store: Arc<dyn BallotStore>) -> Self {
        Self { store }
    }

    /// Tally `decision_id`. `NoBallots` when it was not put to a vote.
    pub async fn tally(&self, decision_id: &str) -> Result<VoteResult, TallyError> {
        let ballots = self.store.ballots_for(decision_id).await?;
        let result = tally_ballots(&ballots).ok_or_else(|| TallyError::NoBallots {
            decision_id: decision_id.to_string(),
        })?;
        debug!(
            "Tallied {} ({:?}): {} for, {} against, {} abstained",
            decision_id, result.mode, result.for_count, result.against_count, result.abstained_count
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bloc_vote_weights_by_seats() {
        let r = tally_ballots(&[
            Ballot::party("D-1", "A", Stance::For, 40),
            Ballot::party("D-1", "B", Stance::Against, 35),
            Ballot::party("D-1", "C", Stance::Abstained, 10),
        ])
        .unwrap();
        assert_eq!(r.mode, VoteMode::Bloc);
        assert_eq!((r.for_count, r.against_count, r.abstained_count), (40, 35, 10));
        assert_eq!(r.for_set, set(&["A"]));
        assert_eq!(r.against_set, set(&["B"]));
        assert_eq!(r.abstained_set, set(&["C"]));
    }

    #[test]
    fn roll_call_counts_members() {
        let r = tally_ballots(&[
            Ballot::member("D-2", "Jansen", "A", Stance::For),
            Ballot::member("D-2", "de Vries", "A", Stance::For),
            Ballot::member("D-2", "Bakker", "B", Stance::Against),
        ])
        .unwrap();
        assert_eq!(r.mode, VoteMode::RollCall);
        assert_eq!((r.for_count, r.against_count, r.abstained_count), (2, 1, 0));
        assert_eq!(r.for_set, set(&["Jansen", "de Vries"]));
        assert_eq!(r.against_set, set(&["Bakker"]));
    }

    #[test]
    fn any_named_row_makes_it_a_roll_call() {
        let mut party_row = Ballot::party("D-3", "A", Stance::Against, 40);
        party_row.member = Some("   ".into());
        let r = tally_ballots(&[
            party_row,
            Ballot::member("D-3", "Visser", "B", Stance::For),
        ])
        .unwrap();
        assert_eq!(r.mode, VoteMode::RollCall);
        // Rows without a member still count once, under the party name.
        assert_eq!((r.for_count, r.against_count), (1, 1));
        assert_eq!(r.against_set, set(&["A"]));
    }

    #[test]
    fn unknown_stance_is_ignored() {
        let r = tally_ballots(&[
            Ballot::party("D-4", "A", Stance::For, 10),
            Ballot::party("D-4", "B", Stance::from("Mist"), 20),
        ])
        .unwrap();
        assert_eq!(r.total(), 10);
        assert!(r.against_set.is_empty() && r.abstained_set.is_empty());
    }

    #[test]
    fn no_ballots_is_none() {
        assert!(tally_ballots(&[]).is_none());
    }

    #[test]
    fn stance_labels_parse_case_insensitively() {
        assert_eq!(Stance::from("Voor"), Stance::For);
        assert_eq!(Stance::from("TEGEN"), Stance::Against);
        assert_eq!(Stance::from("Niet deelgenomen"), Stance::Abstained);
        assert_eq!(Stance::from("against"), Stance::Against);
        assert_eq!(Stance::from("maybe"), Stance::Other("maybe".into()));
    }

    #[test]
    fn not_participated_spellings_count_as_abstained() {
        for label in [
            "notParticipated",
            "not_participated",
            "not participated",
            "Not-Participated",
            "niet deelgenomen",
            " abstained ",
        ] {
            assert_eq!(Stance::from(label), Stance::Abstained, "{label:?}");
            let r = tally_ballots(&[Ballot::party("D-6", "A", Stance::from(label), 10)]).unwrap();
            assert_eq!(r.abstained_count, 10, "{label:?}");
            assert_eq!(r.abstained_set, set(&["A"]), "{label:?}");
        }
    }

    #[test]
    fn result_serialises_for_the_serving_layer() {
        let r = tally_ballots(&[Ballot::party("D-1", "A", Stance::For, 40)]).unwrap();
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["mode"], "bloc");
        assert_eq!(json["for_count"], 40);
        assert_eq!(json["for_set"][0], "A");
    }
}
