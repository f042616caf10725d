use std::collections::BTreeMap;

use super::config::Rewards;

/// XP for one quiz attempt: the score share of the quiz maximum, rounded.
pub fn quiz_award(score_percent: f64, max_xp: i64) -> i64 {
    let share = score_percent.clamp(0.0, 100.0) / 100.0;
    (share * max_xp as f64).round() as i64
}

/// Percentage of correct answers, 0 for an empty quiz.
pub fn score_percent(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    correct as f64 * 100.0 / total as f64
}

/// Amount still owed so a response's running total reaches `target`.
/// Never negative: a response that already reached the target gets nothing.
pub fn accepted_topup(target: i64, already_awarded: i64) -> i64 {
    (target - already_awarded).max(0)
}

/// Signed ledger amount for abandoning a challenge.
pub fn abandon_penalty(rewards: &Rewards) -> i64 {
    -rewards.desistencia
}

/// Part of a penalty that can actually be taken from `current_xp`.
/// Whatever would go below 0 is forgiven, not carried as debt.
pub fn capped_penalty(penalty: i64, current_xp: i64) -> i64 {
    penalty.max(-current_xp.max(0))
}

/// Monthly XP from the month's ledger amounts in chronological order, with
/// the running total floored at 0 after every entry.
pub fn monthly_running_total(amounts: impl IntoIterator<Item = i64>) -> i64 {
    amounts
        .into_iter()
        .fold(0, |total, amount| (total + amount).max(0))
}

/// A direct response whose author holds XP tied to a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerStake {
    pub author_id: i64,
    pub accepted: bool,
}

/// XP each user gives back when a question is deleted: the question author
/// owes the question reward, every direct response author owes the base
/// reward, or the full accepted reward for the accepted response.
pub fn question_revert_plan(
    question_author: i64,
    answers: &[AnswerStake],
    rewards: &Rewards,
) -> BTreeMap<i64, i64> {
    let mut owed = BTreeMap::new();
    *owed.entry(question_author).or_insert(0) += rewards.pergunta;

    for answer in answers {
        let amount = if answer.accepted {
            rewards.resposta_certa
        } else {
            rewards.resposta
        };
        *owed.entry(answer.author_id).or_insert(0) += amount;
    }

    owed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_award_scales_with_score() {
        assert_eq!(quiz_award(100.0, 20), 20);
        assert_eq!(quiz_award(50.0, 20), 10);
        assert_eq!(quiz_award(0.0, 20), 0);
        assert_eq!(quiz_award(score_percent(2, 3), 20), 13);
        assert_eq!(quiz_award(score_percent(1, 3), 20), 7);
        assert_eq!(quiz_award(140.0, 20), 20);
    }

    #[test]
    fn score_percent_handles_empty_quiz() {
        assert_eq!(score_percent(0, 0), 0.0);
        assert_eq!(score_percent(3, 4), 75.0);
    }

    #[test]
    fn topup_reaches_target_once() {
        assert_eq!(accepted_topup(30, 1), 29);
        assert_eq!(accepted_topup(30, 0), 30);
        assert_eq!(accepted_topup(30, 30), 0);
        assert_eq!(accepted_topup(30, 45), 0);
    }

    #[test]
    fn revert_plan_charges_accepted_reward() {
        let rewards = Rewards::default();
        let answers = [
            AnswerStake {
                author_id: 2,
                accepted: true,
            },
            AnswerStake {
                author_id: 3,
                accepted: false,
            },
        ];
        let plan = question_revert_plan(1, &answers, &rewards);
        assert_eq!(plan.get(&1), Some(&5));
        assert_eq!(plan.get(&2), Some(&30));
        assert_eq!(plan.get(&3), Some(&1));
    }

    #[test]
    fn revert_plan_merges_same_user() {
        let rewards = Rewards::default();
        let answers = [
            AnswerStake {
                author_id: 1,
                accepted: false,
            },
            AnswerStake {
                author_id: 1,
                accepted: false,
            },
        ];
        let plan = question_revert_plan(1, &answers, &rewards);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.get(&1), Some(&7));
    }

    #[test]
    fn penalty_is_negative() {
        assert_eq!(abandon_penalty(&Rewards::default()), -10);
    }

    #[test]
    fn penalty_never_exceeds_current_xp() {
        assert_eq!(capped_penalty(-10, 50), -10);
        assert_eq!(capped_penalty(-10, 4), -4);
        assert_eq!(capped_penalty(-10, 0), 0);
        assert_eq!(capped_penalty(-10, -3), 0);
    }

    #[test]
    fn monthly_total_forgives_dips_below_zero() {
        assert_eq!(monthly_running_total(Vec::<i64>::new()), 0);
        assert_eq!(monthly_running_total([5, 1, 29]), 35);
        assert_eq!(monthly_running_total([3, -10, 5]), 5);
        assert_eq!(monthly_running_total([-10, 5, -2]), 3);
    }
}
