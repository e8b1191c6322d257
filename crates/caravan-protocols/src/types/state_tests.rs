use super::*;

#[test]
fn test_workflow_state_wire_names() {
    assert_eq!(serde_json::to_string(&WorkflowState::Created).unwrap(), "\"CREATED\"");
    assert_eq!(serde_json::to_string(&WorkflowState::Running).unwrap(), "\"RUNNING\"");
    assert_eq!(serde_json::to_string(&WorkflowState::Paused).unwrap(), "\"PAUSED\"");
    assert_eq!(serde_json::to_string(&WorkflowState::Completed).unwrap(), "\"COMPLETED\"");
    assert_eq!(serde_json::to_string(&WorkflowState::Failed).unwrap(), "\"FAILED\"");
}

#[test]
fn test_step_status_wire_names() {
    let names: Vec<String> = StepStatus::ALL
        .iter()
        .map(|s| serde_json::to_string(s).unwrap())
        .collect();
    assert_eq!(
        names,
        vec!["\"PENDING\"", "\"RUNNING\"", "\"COMPLETED\"", "\"FAILED\"", "\"SKIPPED\""]
    );
}

#[test]
fn test_workflow_state_from_str() {
    assert_eq!("running".parse::<WorkflowState>().unwrap(), WorkflowState::Running);
    assert_eq!(" FAILED ".parse::<WorkflowState>().unwrap(), WorkflowState::Failed);
    assert!("done".parse::<WorkflowState>().is_err());
}

#[test]
fn test_step_status_from_str() {
    assert_eq!("skipped".parse::<StepStatus>().unwrap(), StepStatus::Skipped);
    assert!("waiting".parse::<StepStatus>().is_err());
}

#[test]
fn test_workflow_transitions() {
    use WorkflowState::*;

    assert!(Created.can_transition_to(Running));
    assert!(Running.can_transition_to(Paused));
    assert!(Running.can_transition_to(Completed));
    assert!(Running.can_transition_to(Failed));
    assert!(Paused.can_transition_to(Running));
    assert!(Failed.can_transition_to(Running));

    assert!(!Completed.can_transition_to(Running));
    assert!(!Created.can_transition_to(Paused));
    assert!(!Paused.can_transition_to(Paused));
    assert!(!Created.can_transition_to(Completed));
    assert!(!Paused.can_transition_to(Completed));
}

#[test]
fn test_step_transitions() {
    use StepStatus::*;

    let legal = [
        (Pending, Running),
        (Running, Completed),
        (Running, Failed),
        (Failed, Pending),
        (Pending, Skipped),
        (Failed, Skipped),
    ];

    for from in StepStatus::ALL {
        for to in StepStatus::ALL {
            let expected = legal.contains(&(from, to));
            assert_eq!(
                from.can_transition_to(to),
                expected,
                "transition {} -> {}",
                from,
                to
            );
        }
    }
}

#[test]
fn test_is_done_and_terminal() {
    assert!(StepStatus::Completed.is_done());
    assert!(StepStatus::Skipped.is_done());
    assert!(!StepStatus::Failed.is_done());

    assert!(WorkflowState::Completed.is_terminal());
    assert!(WorkflowState::Failed.is_terminal());
    assert!(!WorkflowState::Paused.is_terminal());
}
