//! Fixed per-category, per-outcome, per-language message templates.
//!
//! An unresolved language falls back to the configured default language,
//! never to an empty string.

use once_cell::sync::Lazy;

use forma_core::Category;

/// Terminal outcome of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationOutcome {
    Complete,
    Error,
}

/// Resolved title/body pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageTemplate {
    pub title: &'static str,
    pub body: &'static str,
}

/// Languages with a full template table.
pub const SUPPORTED_LANGUAGES: [&str; 2] = ["en", "ko"];

struct TemplateEntry {
    category: Category,
    outcome: NotificationOutcome,
    language: &'static str,
    template: MessageTemplate,
}

macro_rules! entry {
    ($category:expr, $outcome:expr, $language:literal, $title:literal, $body:literal) => {
        TemplateEntry {
            category: $category,
            outcome: $outcome,
            language: $language,
            template: MessageTemplate {
                title: $title,
                body: $body,
            },
        }
    };
}

static TEMPLATES: Lazy<Vec<TemplateEntry>> = Lazy::new(|| {
    use Category::*;
    use NotificationOutcome::*;
    vec![
        // Workout
        entry!(Workout, Complete, "en", "Workout plan ready", "Your new workout plan is ready. Open the app to start training."),
        entry!(Workout, Complete, "ko", "운동 플랜 완성", "새로운 운동 플랜이 준비되었습니다. 앱에서 확인해 보세요."),
        entry!(Workout, Error, "en", "Workout plan failed", "We couldn't generate your workout plan this time. Please try again later."),
        entry!(Workout, Error, "ko", "운동 플랜 생성 실패", "운동 플랜을 생성하지 못했습니다. 잠시 후 다시 시도해 주세요."),
        // Meal
        entry!(Meal, Complete, "en", "Meal plan ready", "Your personalized meal plan is ready to view."),
        entry!(Meal, Complete, "ko", "식단 플랜 완성", "맞춤 식단 플랜이 준비되었습니다. 앱에서 확인해 보세요."),
        entry!(Meal, Error, "en", "Meal plan failed", "We couldn't generate your meal plan this time. Please try again later."),
        entry!(Meal, Error, "ko", "식단 플랜 생성 실패", "식단 플랜을 생성하지 못했습니다. 잠시 후 다시 시도해 주세요."),
        // InBody scan
        entry!(InbodyScan, Complete, "en", "InBody analysis ready", "Your InBody results have been analyzed. See your updated metrics."),
        entry!(InbodyScan, Complete, "ko", "인바디 분석 완료", "인바디 결과 분석이 완료되었습니다. 변화된 수치를 확인해 보세요."),
        entry!(InbodyScan, Error, "en", "InBody analysis failed", "We couldn't read your InBody sheet. Please retake the photo and try again."),
        entry!(InbodyScan, Error, "ko", "인바디 분석 실패", "인바디 결과지를 인식하지 못했습니다. 사진을 다시 찍어 시도해 주세요."),
        // Body photo
        entry!(BodyPhoto, Complete, "en", "Body analysis ready", "Your body photo analysis is complete."),
        entry!(BodyPhoto, Complete, "ko", "체형 분석 완료", "체형 사진 분석이 완료되었습니다."),
        entry!(BodyPhoto, Error, "en", "Body analysis failed", "We couldn't analyze your photo. Please try again with a clearer picture."),
        entry!(BodyPhoto, Error, "ko", "체형 분석 실패", "사진을 분석하지 못했습니다. 더 선명한 사진으로 다시 시도해 주세요."),
    ]
});

/// Resolve the template for a category/outcome in the requested language,
/// falling back to `default_language`.
///
/// The table is complete for [`SUPPORTED_LANGUAGES`]; resolution against a
/// supported default can therefore never miss.
pub fn resolve(
    category: Category,
    outcome: NotificationOutcome,
    language: &str,
    default_language: &str,
) -> MessageTemplate {
    lookup(category, outcome, language)
        .or_else(|| lookup(category, outcome, default_language))
        .or_else(|| lookup(category, outcome, "en"))
        .expect("template table covers every category/outcome in English")
}

fn lookup(
    category: Category,
    outcome: NotificationOutcome,
    language: &str,
) -> Option<MessageTemplate> {
    TEMPLATES
        .iter()
        .find(|e| e.category == category && e.outcome == outcome && e.language == language)
        .map(|e| e.template)
}
