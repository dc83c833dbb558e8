use super::*;
use crate::error::cycle_error;
use std::fs;

fn setup() -> (tempfile::TempDir, CyclePaths, AnalysisCycle) {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    let paths = CyclePaths::new(
        root.join("run"),
        root.join("work"),
        root.join("WRFDA"),
        root.join("obs"),
    );
    fs::create_dir_all(root.join("run")).expect("create run dir");
    fs::write(paths.wrfinput(Domain::OUTER), "real output").expect("write wrfinput");
    let cycle = AnalysisCycle::parse("2014-07-27T02:00:00").expect("cycle");
    (dir, paths, cycle)
}

#[test]
fn only_lower_and_lateral_are_boundary_types() {
    assert_eq!("lower".parse::<BoundaryKind>().unwrap(), BoundaryKind::Lower);
    assert_eq!(
        "lateral".parse::<BoundaryKind>().unwrap(),
        BoundaryKind::Lateral
    );
    for bad in ["diagonal", "Lower", "LATERAL", " lower", "", "low"] {
        let err = bad.parse::<BoundaryKind>().expect_err(bad);
        assert!(
            matches!(cycle_error(&err), Some(CycleError::Configuration(_))),
            "{bad:?} should be a configuration error"
        );
    }
}

#[test]
fn unknown_type_fails_before_touching_files() {
    let (_dir, paths, cycle) = setup();
    let workspace = WorkspaceManager::new(&paths).open(Domain::OUTER);
    let step = BoundaryUpdateStep::new(&paths);
    let err = step
        .prepare_named("diagonal", &workspace, &cycle)
        .expect_err("diagonal");
    assert!(err.to_string().contains("diagonal"));
    assert!(!workspace.root().exists());
}

#[test]
fn lower_pass_injects_domain_and_model_input() {
    let (_dir, paths, cycle) = setup();
    let workspace = WorkspaceManager::new(&paths)
        .reset(Domain::OUTER)
        .expect("reset");
    let step = BoundaryUpdateStep::new(&paths);
    step.write_template(BoundaryKind::Lower, &workspace)
        .expect("template");
    let spec = step
        .resolve(BoundaryKind::Lower, &workspace, &cycle)
        .expect("resolve");

    let parame = namelist::read(&workspace.path(PARAME_FILE)).expect("read parame");
    assert_eq!(
        parame.get(CONTROL_GROUP, "wrf_input"),
        Some(&Value::Text(paths.wrfinput(Domain::OUTER).display().to_string()))
    );
    assert_eq!(
        parame.get(CONTROL_GROUP, "low_bdy_only"),
        Some(&Value::Logical(true))
    );
    assert_eq!(parame.get(CONTROL_GROUP, "domain_id"), Some(&Value::Integer(1)));
    assert_eq!(spec.da_file, workspace.path("fg"));
    assert_eq!(
        fs::read_to_string(workspace.path("fg")).unwrap(),
        "real output"
    );
}

#[test]
fn lateral_pass_points_at_analysis_output() {
    let (_dir, paths, cycle) = setup();
    let workspace = WorkspaceManager::new(&paths)
        .reset(Domain::OUTER)
        .expect("reset");
    let step = BoundaryUpdateStep::new(&paths);
    step.prepare_named("lateral", &workspace, &cycle)
        .expect("prepare lateral");

    let parame = namelist::read(&workspace.path(PARAME_FILE)).expect("read parame");
    let da_file = workspace.path("wrfvar_output").display().to_string();
    assert_eq!(
        parame.get(CONTROL_GROUP, "da_file"),
        Some(&Value::Text(da_file))
    );
    assert_eq!(
        parame.get(CONTROL_GROUP, "update_lateral_bdy"),
        Some(&Value::Logical(true))
    );
    assert_eq!(
        parame.get(CONTROL_GROUP, "update_low_bdy"),
        Some(&Value::Logical(false))
    );
    assert!(parame.get(CONTROL_GROUP, "low_bdy_only").is_none());
    assert!(!workspace.path("fg").exists());
}
