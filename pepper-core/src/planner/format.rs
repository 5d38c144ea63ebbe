use crate::planner::model::ExecutionPlan;

pub fn format_plan_text(plan: &ExecutionPlan) -> String {
    let mut out = String::from("execution order:\n");
    for (idx, leaf) in plan.order.iter().enumerate() {
        out.push_str(&format!("  {}. {leaf}", idx + 1));
        if let Some(deps) = plan.depends_on.get(leaf).filter(|d| !d.is_empty()) {
            out.push_str(&format!(" (after {})", deps.join(", ")));
        }
        out.push('\n');
    }

    out.push_str("\nlevels:\n");
    for (idx, level) in plan.levels.iter().enumerate() {
        out.push_str(&format!("  Level {idx}: {}\n", level.join(", ")));
    }
    out
}
