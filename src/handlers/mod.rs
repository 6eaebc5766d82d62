pub mod meal_analysis;

pub use meal_analysis::MealAnalysisHandler;
