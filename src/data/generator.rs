use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::config::GeneratorConfig;
use crate::error::Result;
use crate::state::record::{Dataset, StudentRecord};

/// Produce `config.count` synthetic students with ids `1..=count`.
/// Every age and score is drawn independently and uniformly from its
/// inclusive range.
pub fn generate<R: Rng>(config: &GeneratorConfig, rng: &mut R) -> Result<Dataset> {
    config.validate()?;

    let ages = config.age_range.min..=config.age_range.max;
    let scores = config.score_range.min..=config.score_range.max;
    let mut dataset = Dataset::with_capacity(config.subjects.clone(), config.count);

    for student_id in 1..=config.count as u64 {
        let age = rng.gen_range(ages.clone());
        let record_scores: Vec<u32> = (0..config.subjects.len())
            .map(|_| rng.gen_range(scores.clone()))
            .collect();
        dataset.push(StudentRecord {
            student_id,
            name: StudentRecord::default_name(student_id),
            age,
            scores: record_scores,
        })?;
    }

    tracing::debug!(
        "Generated {} students across {} subjects",
        dataset.len(),
        dataset.subjects().len()
    );
    Ok(dataset)
}

/// Generate with a seeded RNG when `seed` is set, otherwise from entropy.
pub fn generate_seeded(config: &GeneratorConfig, seed: Option<u64>) -> Result<Dataset> {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    generate(config, &mut rng)
}
