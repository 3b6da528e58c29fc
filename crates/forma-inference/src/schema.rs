//! Structural validation of provider responses against category schemas.
//!
//! Each category has its own strict structural contract; a response that
//! does not satisfy it is [`forma_core::Error::InvalidResponse`], a distinct
//! error kind, never a silent pass-through.

use serde_json::Value as JsonValue;

use forma_core::{
    Artifact, BodyPhotoReport, Category, Error, InbodyReport, MealPlan, Result, WorkoutPlan,
};

/// Parse and validate a provider JSON payload for the given category.
pub fn validate_artifact(category: Category, value: JsonValue) -> Result<Artifact> {
    match category {
        Category::Workout => {
            let plan: WorkoutPlan = parse(category, value)?;
            validate_workout(&plan)?;
            Ok(Artifact::Workout(plan))
        }
        Category::Meal => {
            let plan: MealPlan = parse(category, value)?;
            validate_meal(&plan)?;
            Ok(Artifact::Meal(plan))
        }
        Category::InbodyScan => {
            let report: InbodyReport = parse(category, value)?;
            validate_inbody(&report)?;
            Ok(Artifact::InbodyScan(report))
        }
        Category::BodyPhoto => {
            let report: BodyPhotoReport = parse(category, value)?;
            validate_body_photo(&report)?;
            Ok(Artifact::BodyPhoto(report))
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(category: Category, value: JsonValue) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| Error::InvalidResponse(format!("{} payload: {}", category, e)))
}

fn invalid(category: Category, detail: &str) -> Error {
    Error::InvalidResponse(format!("{}: {}", category, detail))
}

fn validate_workout(plan: &WorkoutPlan) -> Result<()> {
    if plan.title.trim().is_empty() {
        return Err(invalid(Category::Workout, "empty title"));
    }
    if plan.days.is_empty() {
        return Err(invalid(Category::Workout, "plan has no days"));
    }
    for day in &plan.days {
        if day.exercises.is_empty() {
            return Err(invalid(
                Category::Workout,
                &format!("day '{}' has no exercises", day.name),
            ));
        }
        for exercise in &day.exercises {
            if exercise.name.trim().is_empty() {
                return Err(invalid(Category::Workout, "unnamed exercise"));
            }
            if exercise.sets == 0 {
                return Err(invalid(
                    Category::Workout,
                    &format!("exercise '{}' has zero sets", exercise.name),
                ));
            }
        }
    }
    Ok(())
}

fn validate_meal(plan: &MealPlan) -> Result<()> {
    if plan.title.trim().is_empty() {
        return Err(invalid(Category::Meal, "empty title"));
    }
    if plan.days.is_empty() {
        return Err(invalid(Category::Meal, "plan has no days"));
    }
    for day in &plan.days {
        if day.meals.is_empty() {
            return Err(invalid(
                Category::Meal,
                &format!("day '{}' has no meals", day.name),
            ));
        }
        for meal in &day.meals {
            if meal.foods.is_empty() {
                return Err(invalid(
                    Category::Meal,
                    &format!("meal '{}' lists no foods", meal.name),
                ));
            }
        }
    }
    Ok(())
}

fn validate_inbody(report: &InbodyReport) -> Result<()> {
    let metrics = [
        ("weight_kg", report.weight_kg),
        ("skeletal_muscle_mass_kg", report.skeletal_muscle_mass_kg),
        ("body_fat_percent", report.body_fat_percent),
        ("bmi", report.bmi),
    ];
    for (name, value) in metrics {
        if !value.is_finite() || value < 0.0 {
            return Err(invalid(
                Category::InbodyScan,
                &format!("{} out of range: {}", name, value),
            ));
        }
    }
    if report.body_fat_percent > 100.0 {
        return Err(invalid(Category::InbodyScan, "body_fat_percent > 100"));
    }
    Ok(())
}

fn validate_body_photo(report: &BodyPhotoReport) -> Result<()> {
    let (low, high) = (report.estimated_body_fat_low, report.estimated_body_fat_high);
    if !low.is_finite() || !high.is_finite() || low < 0.0 || high > 100.0 || low > high {
        return Err(invalid(
            Category::BodyPhoto,
            &format!("body fat range invalid: {}-{}", low, high),
        ));
    }
    if report.recommendations.is_empty() {
        return Err(invalid(Category::BodyPhoto, "no recommendations"));
    }
    Ok(())
}
