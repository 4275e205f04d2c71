use super::*;

#[tokio::test]
async fn single_request_resolves_and_is_accepted() {
    let mut gate = RequestGate::new();
    let gated = gate.begin(async { 7 });
    assert!(gate.is_pending());

    let (ticket, out) = gated.resolve().await;
    assert_eq!(out, Ok(7));
    assert!(gate.finish(ticket));
    assert!(!gate.is_pending());
}

#[tokio::test]
async fn newer_request_aborts_older() {
    let mut gate = RequestGate::new();
    let first = gate.begin(async { "first" });
    let second = gate.begin(async { "second" });

    let (old_ticket, old) = first.resolve().await;
    assert_eq!(old, Err(Aborted));
    assert!(!gate.finish(old_ticket));

    let (new_ticket, new) = second.resolve().await;
    assert_eq!(new, Ok("second"));
    assert!(gate.finish(new_ticket));
}

#[tokio::test]
async fn stale_result_that_raced_past_abort_is_discarded() {
    let mut gate = RequestGate::new();
    let first = gate.begin(async { 1 });
    // resolve before the newer request is issued
    let (stale_ticket, out) = first.resolve().await;
    assert_eq!(out, Ok(1));

    let second = gate.begin(async { 2 });
    assert!(!gate.finish(stale_ticket));
    assert_eq!(second.ticket(), RequestTicket(2));
    assert!(gate.is_current(second.ticket()));
}

#[tokio::test]
async fn cancel_aborts_without_issuing() {
    let mut gate = RequestGate::new();
    let gated = gate.begin(async { 1 });
    gate.cancel();
    assert!(!gate.is_pending());

    let (ticket, out) = gated.resolve().await;
    assert_eq!(out, Err(Aborted));
    assert!(!gate.finish(ticket));
}

#[tokio::test]
async fn cancel_after_resolve_rejects_the_result() {
    let mut gate = RequestGate::new();
    let gated = gate.begin(async { 1 });
    let (ticket, out) = gated.resolve().await;
    assert_eq!(out, Ok(1));

    gate.cancel();

    assert!(!gate.is_current(ticket));
    assert!(!gate.finish(ticket));
}
