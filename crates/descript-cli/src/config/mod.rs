//! Configuration loading and resolution.

use std::path::PathBuf;

/// Environment variable naming a plan file.
pub const PLAN_ENV: &str = "DESCRIPT_PLAN";

/// Resolve the plan file path: explicit flag, then `DESCRIPT_PLAN`, then
/// `.descript/plan.json` in the working directory, then the home directory.
pub fn resolve_plan_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Ok(env_path) = std::env::var(PLAN_ENV) {
        if !env_path.is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    let cwd_plan = PathBuf::from(".descript/plan.json");
    if cwd_plan.exists() {
        return Some(cwd_plan);
    }

    let home_plan = default_plan_path();
    home_plan.exists().then_some(home_plan)
}

fn default_plan_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());

    PathBuf::from(home).join(".descript").join("plan.json")
}
