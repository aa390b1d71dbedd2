use claimflow_cli::commands::CommandResult;

#[test]
fn success_outcomes_serialize_as_ok_json() {
    let result = CommandResult::success("migrate", "applied pending migrations");

    assert_eq!(result.exit_code, 0);
    assert!(result.output.contains("\"command\":\"migrate\""));
    assert!(result.output.contains("\"status\":\"ok\""));
    assert!(result.output.contains("applied pending migrations"));
}

#[test]
fn failure_outcomes_carry_error_class_and_exit_code() {
    let result =
        CommandResult::failure("seed", "db_connectivity", "failed to connect: refused", 4);

    assert_eq!(result.exit_code, 4);
    assert!(result.output.contains("\"status\":\"error\""));
    assert!(result.output.contains("\"exit_code\":4"));
    assert!(result.output.contains("\"error_class\":\"db_connectivity\""));
}

#[test]
fn failure_messages_with_quotes_stay_valid_json() {
    let result = CommandResult::failure("migrate", "migration", "bad \"quoted\" input", 5);

    let parsed: serde_json::Value =
        serde_json::from_str(&result.output).expect("output should be valid JSON");
    assert_eq!(parsed["error_class"], "migration");
    assert_eq!(parsed["message"], "bad \"quoted\" input");
}
