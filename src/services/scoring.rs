use serde::Serialize;
use rocket_okapi::okapi::schemars::JsonSchema;

use crate::models::question::QuestionKind;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// -----------------------------
/// Configuration
/// -----------------------------

/// Split of the 100-point final-mark scale across question sections.
#[derive(Debug, Clone, Copy)]
pub struct SectionWeights {
    pub mcq: f64,
    pub tf: f64,
    pub coding: f64,
}

impl SectionWeights {
    pub fn from_config() -> Self {
        SectionWeights {
            mcq: crate::config::Config::final_mcq_weight(),
            tf: crate::config::Config::final_tf_weight(),
            coding: crate::config::Config::final_coding_weight(),
        }
    }

    pub fn total(&self) -> f64 {
        self.mcq + self.tf + self.coding
    }
}

impl Default for SectionWeights {
    fn default() -> Self {
        SectionWeights {
            mcq: 30.0,
            tf: 20.0,
            coding: 50.0,
        }
    }
}

/// Letter-grade cutoffs on the final-mark scale.
#[derive(Debug, Clone, Copy)]
pub struct GradeScale {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl GradeScale {
    pub fn from_config() -> Self {
        GradeScale {
            a: crate::config::Config::grade_a_cutoff(),
            b: crate::config::Config::grade_b_cutoff(),
            c: crate::config::Config::grade_c_cutoff(),
        }
    }

    pub fn grade(&self, final_mark: f64) -> &'static str {
        if final_mark >= self.a {
            "A"
        } else if final_mark >= self.b {
            "B"
        } else if final_mark >= self.c {
            "C"
        } else {
            "F"
        }
    }
}

impl Default for GradeScale {
    fn default() -> Self {
        GradeScale {
            a: 90.0,
            b: 70.0,
            c: 50.0,
        }
    }
}

/// -----------------------------
/// Answer matching
/// -----------------------------

/// Placement comparison: exact, trimmed, case-sensitive.
pub fn placement_answer_correct(kind: &QuestionKind, answer: &str) -> bool {
    match kind {
        QuestionKind::Mcq { correct_answer, .. } => answer.trim() == correct_answer.trim(),
        QuestionKind::TrueFalse { correct_answer } => {
            answer.trim() == if *correct_answer { "true" } else { "false" }
        }
        // Code questions are graded through the evaluator, never here.
        QuestionKind::Code { .. } => false,
    }
}

/// Final-assessment comparison: trimmed, case-insensitive.
pub fn final_answer_correct(kind: &QuestionKind, answer: &str) -> bool {
    match kind {
        QuestionKind::Mcq { correct_answer, .. } => {
            answer.trim().eq_ignore_ascii_case(correct_answer.trim())
        }
        QuestionKind::TrueFalse { correct_answer } => {
            answer
                .trim()
                .eq_ignore_ascii_case(if *correct_answer { "true" } else { "false" })
        }
        QuestionKind::Code { .. } => false,
    }
}

/// -----------------------------
/// Placement scoring
/// -----------------------------

#[derive(Debug, Serialize, JsonSchema)]
pub struct AnswerResult {
    pub question_id: String,
    pub is_correct: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PlacementOutcome {
    pub score: i64,
    pub total_questions: i64,
    pub percentage: f64,
    pub passed: bool,
}

/// Aggregate per-question results into the placement outcome. One point
/// per correct answer; `percentage` is rounded to two decimals.
pub fn score_placement(results: &[AnswerResult], pass_threshold: f64) -> PlacementOutcome {
    let total = results.len() as i64;
    let score = results.iter().filter(|r| r.is_correct).count() as i64;

    let percentage = if total > 0 {
        round2(score as f64 / total as f64 * 100.0)
    } else {
        0.0
    };

    PlacementOutcome {
        score,
        total_questions: total,
        percentage,
        passed: percentage >= pass_threshold,
    }
}

/// -----------------------------
/// Final assessment scoring
/// -----------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Mcq,
    Tf,
    Coding,
}

/// One graded question: its section, its weight (explicit project mark or
/// implicit 1.0) and the earned share of that weight. Mcq/tf earn all or
/// nothing; coding earns proportionally to test cases passed.
#[derive(Debug, Clone, Copy)]
pub struct GradedQuestion {
    pub section: Section,
    pub weight: f64,
    pub earned: f64,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct FinalScore {
    pub mcq_marks: f64,
    pub tf_marks: f64,
    pub coding_marks: f64,
    pub final_mark: f64,
    pub grade: String,
    pub total_mcq: i64,
    pub total_tf: i64,
    pub total_coding: i64,
}

/// Compute the weighted final score. Each section scales its earned ratio
/// by the configured section weight, so the sum lands in [0, total weight]
/// (100 with the defaults). A section with no questions contributes 0.
pub fn score_final(
    graded: &[GradedQuestion],
    weights: &SectionWeights,
    scale: &GradeScale,
) -> FinalScore {
    let mut counts = [0i64; 3];
    let mut earned = [0.0f64; 3];
    let mut possible = [0.0f64; 3];

    for q in graded {
        let idx = match q.section {
            Section::Mcq => 0,
            Section::Tf => 1,
            Section::Coding => 2,
        };
        counts[idx] += 1;
        earned[idx] += q.earned;
        possible[idx] += q.weight;
    }

    let section_mark = |idx: usize, weight: f64| -> f64 {
        if possible[idx] > 0.0 {
            earned[idx] / possible[idx] * weight
        } else {
            0.0
        }
    };

    let mcq_marks = section_mark(0, weights.mcq);
    let tf_marks = section_mark(1, weights.tf);
    let coding_marks = section_mark(2, weights.coding);
    let final_mark = mcq_marks + tf_marks + coding_marks;

    FinalScore {
        mcq_marks: round2(mcq_marks),
        tf_marks: round2(tf_marks),
        coding_marks: round2(coding_marks),
        final_mark: round2(final_mark),
        grade: scale.grade(final_mark).to_string(),
        total_mcq: counts[0],
        total_tf: counts[1],
        total_coding: counts[2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(correct: usize, wrong: usize) -> Vec<AnswerResult> {
        let mut out = Vec::new();
        for i in 0..correct {
            out.push(AnswerResult {
                question_id: format!("c{}", i),
                is_correct: true,
            });
        }
        for i in 0..wrong {
            out.push(AnswerResult {
                question_id: format!("w{}", i),
                is_correct: false,
            });
        }
        out
    }

    #[test]
    fn placement_six_of_ten_is_sixty_percent() {
        let outcome = score_placement(&results(6, 4), 60.0);
        assert_eq!(outcome.score, 6);
        assert_eq!(outcome.total_questions, 10);
        assert_eq!(outcome.percentage, 60.0);
        assert!(outcome.passed);
    }

    #[test]
    fn placement_below_threshold_fails() {
        let outcome = score_placement(&results(59, 41), 60.0);
        assert_eq!(outcome.percentage, 59.0);
        assert!(!outcome.passed);

        let strict = score_placement(&results(6, 4), 70.0);
        assert!(!strict.passed);
    }

    #[test]
    fn placement_empty_submission_scores_zero() {
        let outcome = score_placement(&[], 60.0);
        assert_eq!(outcome.total_questions, 0);
        assert_eq!(outcome.percentage, 0.0);
        assert!(!outcome.passed);
    }

    #[test]
    fn placement_matching_is_case_sensitive() {
        let kind = QuestionKind::Mcq {
            options: vec!["Paris".into(), "London".into()],
            correct_answer: "Paris".into(),
        };
        assert!(placement_answer_correct(&kind, " Paris "));
        assert!(!placement_answer_correct(&kind, "paris"));

        let tf = QuestionKind::TrueFalse {
            correct_answer: true,
        };
        assert!(placement_answer_correct(&tf, "true"));
        assert!(!placement_answer_correct(&tf, "True"));
    }

    #[test]
    fn final_matching_is_case_insensitive() {
        let kind = QuestionKind::Mcq {
            options: vec!["A".into(), "B".into()],
            correct_answer: "A".into(),
        };
        assert!(final_answer_correct(&kind, "a"));
        assert!(!final_answer_correct(&kind, "b"));

        let tf = QuestionKind::TrueFalse {
            correct_answer: false,
        };
        assert!(final_answer_correct(&tf, "FALSE"));
        assert!(!final_answer_correct(&tf, "true"));
    }

    fn graded(section: Section, weight: f64, earned: f64) -> GradedQuestion {
        GradedQuestion {
            section,
            weight,
            earned,
        }
    }

    #[test]
    fn perfect_submission_scores_one_hundred_and_a() {
        let questions = vec![
            graded(Section::Mcq, 1.0, 1.0),
            graded(Section::Mcq, 1.0, 1.0),
            graded(Section::Tf, 1.0, 1.0),
            graded(Section::Coding, 1.0, 1.0),
        ];

        let score = score_final(&questions, &SectionWeights::default(), &GradeScale::default());
        assert_eq!(score.final_mark, 100.0);
        assert_eq!(score.grade, "A");
        assert_eq!(score.mcq_marks, 30.0);
        assert_eq!(score.tf_marks, 20.0);
        assert_eq!(score.coding_marks, 50.0);
    }

    #[test]
    fn empty_or_all_wrong_submission_scores_zero_and_f() {
        let wrong = vec![
            graded(Section::Mcq, 1.0, 0.0),
            graded(Section::Tf, 1.0, 0.0),
            graded(Section::Coding, 1.0, 0.0),
        ];
        let score = score_final(&wrong, &SectionWeights::default(), &GradeScale::default());
        assert_eq!(score.final_mark, 0.0);
        assert_eq!(score.grade, "F");

        let empty = score_final(&[], &SectionWeights::default(), &GradeScale::default());
        assert_eq!(empty.final_mark, 0.0);
        assert_eq!(empty.grade, "F");
    }

    #[test]
    fn project_marks_weight_questions_within_a_section() {
        // One 10-mark question correct, one 0.5-mark wrong: the section
        // ratio is 10 / 10.5 of the mcq weight.
        let questions = vec![
            graded(Section::Mcq, 10.0, 10.0),
            graded(Section::Mcq, 0.5, 0.0),
        ];

        let score = score_final(&questions, &SectionWeights::default(), &GradeScale::default());
        assert_eq!(score.mcq_marks, round2(10.0 / 10.5 * 30.0));
        assert_eq!(score.tf_marks, 0.0);
    }

    #[test]
    fn coding_earns_proportionally_to_tests_passed() {
        let questions = vec![
            graded(Section::Coding, 1.0, 0.5),
            graded(Section::Coding, 1.0, 1.0),
        ];

        let score = score_final(&questions, &SectionWeights::default(), &GradeScale::default());
        assert_eq!(score.coding_marks, 37.5);
        assert_eq!(score.total_coding, 2);
    }

    #[test]
    fn grade_cutoffs_are_inclusive() {
        let scale = GradeScale::default();
        assert_eq!(scale.grade(90.0), "A");
        assert_eq!(scale.grade(89.99), "B");
        assert_eq!(scale.grade(70.0), "B");
        assert_eq!(scale.grade(69.99), "C");
        assert_eq!(scale.grade(50.0), "C");
        assert_eq!(scale.grade(49.99), "F");
    }

    #[test]
    fn default_weights_cover_the_full_scale() {
        assert_eq!(SectionWeights::default().total(), 100.0);
    }
}
