//! Deterministic template artifacts used when provider retries exhaust.
//!
//! Plan categories degrade to these templates instead of surfacing failure;
//! vision categories return `None` because a template cannot stand in for
//! measurements read from a user's photo.

use forma_core::{
    Artifact, Category, ExercisePrescription, Meal, MealDay, MealPlan, WorkoutDay, WorkoutPlan,
};

/// Template artifact for a category, or `None` when no safe fallback exists.
pub fn fallback_artifact(category: Category) -> Option<Artifact> {
    match category {
        Category::Workout => Some(Artifact::Workout(fallback_workout_plan())),
        Category::Meal => Some(Artifact::Meal(fallback_meal_plan())),
        Category::InbodyScan | Category::BodyPhoto => None,
    }
}

fn exercise(name: &str, sets: u32, reps: &str, rest_seconds: u32) -> ExercisePrescription {
    ExercisePrescription {
        name: name.to_string(),
        sets,
        reps: reps.to_string(),
        rest_seconds,
    }
}

/// Three-day full-body template, equipment-light and experience-neutral.
fn fallback_workout_plan() -> WorkoutPlan {
    WorkoutPlan {
        title: "Full Body Foundation".to_string(),
        days: vec![
            WorkoutDay {
                name: "Day 1".to_string(),
                focus: Some("lower body".to_string()),
                exercises: vec![
                    exercise("Goblet Squat", 3, "8-12", 120),
                    exercise("Romanian Deadlift", 3, "8-10", 120),
                    exercise("Walking Lunge", 3, "10 per leg", 90),
                    exercise("Plank", 3, "30-45s", 60),
                ],
            },
            WorkoutDay {
                name: "Day 2".to_string(),
                focus: Some("upper body push".to_string()),
                exercises: vec![
                    exercise("Push-Up", 3, "8-15", 90),
                    exercise("Dumbbell Shoulder Press", 3, "8-12", 120),
                    exercise("Incline Dumbbell Press", 3, "8-12", 120),
                    exercise("Triceps Dip", 3, "8-12", 90),
                ],
            },
            WorkoutDay {
                name: "Day 3".to_string(),
                focus: Some("upper body pull".to_string()),
                exercises: vec![
                    exercise("One-Arm Dumbbell Row", 3, "8-12", 120),
                    exercise("Lat Pulldown", 3, "10-12", 120),
                    exercise("Face Pull", 3, "12-15", 90),
                    exercise("Dumbbell Curl", 3, "10-12", 90),
                ],
            },
        ],
        notes: Some(
            "Rest at least one day between sessions. Increase load once the top \
             of the rep range is reached with good form."
                .to_string(),
        ),
    }
}

fn meal(name: &str, foods: &[&str], calories: u32, protein: f32, carbs: f32, fat: f32) -> Meal {
    Meal {
        name: name.to_string(),
        foods: foods.iter().map(|f| f.to_string()).collect(),
        calories,
        protein_g: protein,
        carbs_g: carbs,
        fat_g: fat,
    }
}

/// Single balanced reference day, repeated guidance in the title.
fn fallback_meal_plan() -> MealPlan {
    MealPlan {
        title: "Balanced Reference Day".to_string(),
        days: vec![MealDay {
            name: "Reference Day".to_string(),
            meals: vec![
                meal(
                    "Breakfast",
                    &["rolled oats", "whole milk", "banana", "two eggs"],
                    520,
                    28.0,
                    62.0,
                    16.0,
                ),
                meal(
                    "Lunch",
                    &["grilled chicken breast", "brown rice", "mixed vegetables", "olive oil"],
                    640,
                    45.0,
                    68.0,
                    18.0,
                ),
                meal(
                    "Snack",
                    &["greek yogurt", "almonds", "apple"],
                    330,
                    20.0,
                    32.0,
                    13.0,
                ),
                meal(
                    "Dinner",
                    &["baked salmon", "sweet potato", "green salad"],
                    610,
                    42.0,
                    48.0,
                    24.0,
                ),
            ],
            total_calories: 2100,
        }],
    }
}
