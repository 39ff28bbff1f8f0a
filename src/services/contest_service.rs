use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

use crate::entities::contest_entity as contests;
use crate::entities::contest_entries::{LOSING_ROLL, WINNING_ROLL};
use crate::entities::contests::ContestKind;
use crate::error::AppResult;

/// Where a contest sits relative to its `[start_at, end_at)` window.
///
/// Always derived from a caller-supplied clock; there is no stored status
/// column anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContestPhase {
    Upcoming,
    Ongoing,
    Past,
}

impl ContestPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContestPhase::Upcoming => "upcoming",
            ContestPhase::Ongoing => "ongoing",
            ContestPhase::Past => "past",
        }
    }
}

pub fn contest_phase(contest: &contests::Model, now: DateTime<Utc>) -> ContestPhase {
    if now < contest.start_at {
        ContestPhase::Upcoming
    } else if now < contest.end_at {
        ContestPhase::Ongoing
    } else {
        ContestPhase::Past
    }
}

pub fn is_ongoing(contest: &contests::Model, now: DateTime<Utc>) -> bool {
    contest_phase(contest, now) == ContestPhase::Ongoing
}

/// Roll the die for a new entry and return `(roll, amount_won)`.
///
/// - `no_prize` / `single_winner`: nobody wins at entry time.
/// - `giveaway`: every entrant wins the full amount.
/// - `dice_roll`: uniform draw in `[0, in_n)`; a 0 wins.
///
/// Must be called exactly once per entry, at entry-creation time, with a
/// cryptographically secure `rng` in production (entrants must not be able
/// to predict outcomes). The result is persisted immediately and never
/// recomputed for the same entry.
pub fn roll_die_and_get_winnings<R: Rng>(contest: &contests::Model, rng: &mut R) -> (i32, i32) {
    match contest.kind {
        ContestKind::NoPrize | ContestKind::SingleWinner => (LOSING_ROLL, 0),
        ContestKind::Giveaway => (WINNING_ROLL, contest.amount),
        ContestKind::DiceRoll => {
            let roll = rng.gen_range(0..contest.in_n.max(1));
            let amount_won = if roll == WINNING_ROLL {
                contest.amount
            } else {
                0
            };
            (roll, amount_won)
        }
    }
}

#[derive(Clone)]
pub struct ContestService {
    pool: Arc<DatabaseConnection>,
}

impl ContestService {
    pub fn new(pool: impl Into<Arc<DatabaseConnection>>) -> Self {
        Self { pool: pool.into() }
    }

    pub async fn get_by_id(&self, contest_id: i64) -> AppResult<contests::Model> {
        contests::Entity::find_by_id(contest_id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| {
                crate::error::AppError::NotFound(format!("Contest {contest_id} not found"))
            })
    }

    /// The school's ongoing contest at `now`, if any.
    ///
    /// Schedules should not overlap; if they do, the most recently started
    /// contest wins.
    pub async fn current_contest(
        &self,
        school_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Option<contests::Model>> {
        Ok(contests::Entity::find()
            .filter(contests::Column::SchoolId.eq(school_id))
            .filter(contests::Column::StartAt.lte(now))
            .filter(contests::Column::EndAt.gt(now))
            .order_by_desc(contests::Column::StartAt)
            .one(&*self.pool)
            .await?)
    }

    /// The school's next contest that has not started yet, if any.
    pub async fn next_upcoming_contest(
        &self,
        school_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Option<contests::Model>> {
        Ok(contests::Entity::find()
            .filter(contests::Column::SchoolId.eq(school_id))
            .filter(contests::Column::StartAt.gt(now))
            .order_by_asc(contests::Column::StartAt)
            .one(&*self.pool)
            .await?)
    }

    /// The school's most recently ended contest, if any.
    pub async fn most_recent_past_contest(
        &self,
        school_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Option<contests::Model>> {
        Ok(contests::Entity::find()
            .filter(contests::Column::SchoolId.eq(school_id))
            .filter(contests::Column::EndAt.lte(now))
            .order_by_desc(contests::Column::EndAt)
            .one(&*self.pool)
            .await?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    pub fn test_contest(kind: ContestKind, in_n: i32, amount: i32) -> contests::Model {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        contests::Model {
            id: 1,
            school_id: 1,
            name: "Test Contest".to_string(),
            start_at: start,
            end_at: start + Duration::days(7),
            kind,
            in_n,
            amount,
            prize: "gift card".to_string(),
            prize_long: "Amazon gift card".to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_phase_is_derived_from_the_clock() {
        let contest = test_contest(ContestKind::Giveaway, 1, 5);
        let before = contest.start_at - Duration::seconds(1);
        let at_start = contest.start_at;
        let before_end = contest.end_at - Duration::seconds(1);
        let at_end = contest.end_at;

        assert_eq!(contest_phase(&contest, before), ContestPhase::Upcoming);
        assert_eq!(contest_phase(&contest, at_start), ContestPhase::Ongoing);
        assert_eq!(contest_phase(&contest, before_end), ContestPhase::Ongoing);
        // Half-open interval: the end instant is already past.
        assert_eq!(contest_phase(&contest, at_end), ContestPhase::Past);
        assert!(!is_ongoing(&contest, at_end));
    }

    #[test]
    fn test_giveaway_always_wins() {
        let contest = test_contest(ContestKind::Giveaway, 1, 5);
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            assert_eq!(roll_die_and_get_winnings(&contest, &mut rng), (0, 5));
        }
    }

    #[test]
    fn test_no_prize_and_single_winner_never_win_at_entry_time() {
        let mut rng = rand::thread_rng();
        let no_prize = test_contest(ContestKind::NoPrize, 1, 0);
        assert_eq!(roll_die_and_get_winnings(&no_prize, &mut rng), (1, 0));

        let single_winner = test_contest(ContestKind::SingleWinner, 1, 500);
        assert_eq!(roll_die_and_get_winnings(&single_winner, &mut rng), (1, 0));
    }

    #[test]
    fn test_one_in_one_dice_roll_always_wins() {
        let contest = test_contest(ContestKind::DiceRoll, 1, 25);
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            assert_eq!(roll_die_and_get_winnings(&contest, &mut rng), (0, 25));
        }
    }

    #[test]
    fn test_dice_roll_win_fraction_is_about_one_in_n() {
        let contest = test_contest(ContestKind::DiceRoll, 10, 25);
        let mut rng = rand::thread_rng();
        let trials = 100_000;
        let mut wins = 0u32;
        for _ in 0..trials {
            let (roll, amount_won) = roll_die_and_get_winnings(&contest, &mut rng);
            assert!((0..10).contains(&roll));
            if roll == 0 {
                assert_eq!(amount_won, 25);
                wins += 1;
            } else {
                assert_eq!(amount_won, 0);
            }
        }
        // Expected 10%; the band is ~10 standard deviations wide, so a
        // correct implementation essentially cannot flake.
        let fraction = f64::from(wins) / f64::from(trials);
        assert!(
            (0.09..=0.11).contains(&fraction),
            "win fraction {fraction} outside [0.09, 0.11]"
        );
    }
}
