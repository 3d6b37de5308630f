//! Happiness scoring for realized assignments.
//!
//! A student's happiness compares the score they gave their assigned project
//! against the score scale (`project`) and against their own best score
//! (`poll`). Teams and whole runs aggregate the per-student values by
//! arithmetic mean. Both values live in 0.0..=1.0 and are rounded to two
//! decimals, matching what the displays show.

use serde::{Deserialize, Serialize};

use crate::models::{SCORE_MAX, SCORE_MIN};

/// Normalized preference satisfaction for one (student, project) pair.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Happiness {
    /// Satisfaction against the global maximum score.
    pub project: f64,
    /// Satisfaction against the student's own maximum score; 1.0 iff the
    /// student received one of their personal-best projects.
    pub poll: f64,
}

/// Computes the happiness of a chosen score.
///
/// `own_max` is the student's maximum score over all projects. A student
/// whose answers are all at the scale minimum is trivially satisfied, so the
/// poll component is 1.0 in that case.
pub fn happiness(chosen: i64, own_max: i64) -> Happiness {
    let project = (chosen - SCORE_MIN) as f64 / (SCORE_MAX - SCORE_MIN) as f64;
    let poll = if own_max <= SCORE_MIN {
        1.0
    } else {
        (chosen - SCORE_MIN) as f64 / (own_max - SCORE_MIN) as f64
    };
    Happiness {
        project: round2(project),
        poll: round2(poll),
    }
}

/// Mean happiness over a set of per-student values, rounded to two decimals.
pub fn mean_happiness(values: &[Happiness]) -> Happiness {
    if values.is_empty() {
        return Happiness {
            project: 0.0,
            poll: 0.0,
        };
    }
    let n = values.len() as f64;
    Happiness {
        project: round2(values.iter().map(|h| h.project).sum::<f64>() / n),
        poll: round2(values.iter().map(|h| h.poll).sum::<f64>() / n),
    }
}

/// Categorical display band for a happiness score.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HappinessBand {
    VeryBad,
    Bad,
    Neutral,
    Good,
    VeryGood,
}

impl HappinessBand {
    /// Fixed breakpoints: <=0.2 very bad, then 0.2 steps up to >0.8 very good.
    pub fn from_score(score: f64) -> HappinessBand {
        if score > 0.8 {
            HappinessBand::VeryGood
        } else if score > 0.6 {
            HappinessBand::Good
        } else if score > 0.4 {
            HappinessBand::Neutral
        } else if score > 0.2 {
            HappinessBand::Bad
        } else {
            HappinessBand::VeryBad
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HappinessBand::VeryBad => "very bad",
            HappinessBand::Bad => "bad",
            HappinessBand::Neutral => "neutral",
            HappinessBand::Good => "good",
            HappinessBand::VeryGood => "very good",
        }
    }

    /// Icon name used by the web frontend.
    pub fn icon(self) -> &'static str {
        match self {
            HappinessBand::VeryBad => "emoji-angry",
            HappinessBand::Bad => "emoji-frown",
            HappinessBand::Neutral => "emoji-neutral",
            HappinessBand::Good => "emoji-smile",
            HappinessBand::VeryGood => "emoji-heart-eyes",
        }
    }
}

/// Aggregates of one student's project answers, shown next to the happiness.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PollStats {
    /// The score the student gave the assigned project.
    pub score: i64,
    pub sum: i64,
    pub avg: f64,
    pub min: i64,
    pub max: i64,
}

impl PollStats {
    /// Builds the stats bundle from the chosen score and all of the
    /// student's raw answers. `answers` must be non-empty.
    pub fn from_answers(chosen: i64, answers: &[i64]) -> PollStats {
        let sum: i64 = answers.iter().sum();
        let min = answers.iter().copied().min().unwrap_or(chosen);
        let max = answers.iter().copied().max().unwrap_or(chosen);
        let avg = if answers.is_empty() {
            chosen as f64
        } else {
            round2(sum as f64 / answers.len() as f64)
        };
        PollStats {
            score: chosen,
            sum,
            avg,
            min,
            max,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happiness_is_bounded() {
        for chosen in SCORE_MIN..=SCORE_MAX {
            for own_max in chosen..=SCORE_MAX {
                let h = happiness(chosen, own_max);
                assert!((0.0..=1.0).contains(&h.project), "project {h:?}");
                assert!((0.0..=1.0).contains(&h.poll), "poll {h:?}");
            }
        }
    }

    #[test]
    fn poll_happiness_is_one_at_personal_best() {
        let h = happiness(4, 4);
        assert_eq!(h.poll, 1.0);
        assert_eq!(h.project, 0.75);
    }

    #[test]
    fn all_minimum_answers_count_as_satisfied() {
        let h = happiness(SCORE_MIN, SCORE_MIN);
        assert_eq!(h.poll, 1.0);
        assert_eq!(h.project, 0.0);
    }

    #[test]
    fn values_are_rounded_to_two_decimals() {
        // 2 of 5 -> 1/4 = 0.25, 2 of 4 -> 1/3 = 0.33
        let h = happiness(2, 4);
        assert_eq!(h.project, 0.25);
        assert_eq!(h.poll, 0.33);
    }

    #[test]
    fn band_breakpoints() {
        assert_eq!(HappinessBand::from_score(0.0), HappinessBand::VeryBad);
        assert_eq!(HappinessBand::from_score(0.2), HappinessBand::VeryBad);
        assert_eq!(HappinessBand::from_score(0.21), HappinessBand::Bad);
        assert_eq!(HappinessBand::from_score(0.5), HappinessBand::Neutral);
        assert_eq!(HappinessBand::from_score(0.75), HappinessBand::Good);
        assert_eq!(HappinessBand::from_score(0.81), HappinessBand::VeryGood);
        assert_eq!(HappinessBand::from_score(1.0), HappinessBand::VeryGood);
    }

    #[test]
    fn mean_happiness_averages_both_components() {
        let values = vec![
            Happiness {
                project: 1.0,
                poll: 1.0,
            },
            Happiness {
                project: 0.5,
                poll: 0.0,
            },
        ];
        let mean = mean_happiness(&values);
        assert_eq!(mean.project, 0.75);
        assert_eq!(mean.poll, 0.5);
    }

    #[test]
    fn poll_stats_aggregate_answers() {
        let stats = PollStats::from_answers(4, &[1, 4, 5, 2]);
        assert_eq!(stats.score, 4);
        assert_eq!(stats.sum, 12);
        assert_eq!(stats.avg, 3.0);
        assert_eq!(stats.min, 1);
        assert_eq!(stats.max, 5);
    }
}
