//! Consultation orchestration.
//!
//! Ties the lifecycle rules to a store, the change feed and the external
//! calendar. Every write is a read followed by a conditional write against
//! the version that was read.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, SubsecRound, Utc};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::error::{ConflictDetail, DomainError, StoreError};
use crate::models::consultation::{
    group_by_day, AgendaDay, BusyInterval, ConsultationEdit, ConsultationFilter,
    ConsultationRecord, ConsultationStatus, NewConsultation, TimeWindow,
};
use crate::models::user::Actor;
use crate::services::calendar::{
    CalendarError, CalendarEvent, CalendarGateway, CalendarSync, CalendarToken, FreeBusyQuery,
};
use crate::services::conflict::ConflictChecker;
use crate::services::feed::{ChangeFeed, ConsultationChange, Subscription};
use crate::services::lifecycle::StatusLifecycle;
use crate::services::store::{ConsultationStore, ExpectedVersion};

/// Result of a successful approval.
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub record: ConsultationRecord,
    pub calendar: CalendarSync,
    /// Busy intervals the approver's external calendar reported for the slot.
    /// Advisory only.
    pub external_busy: Vec<BusyInterval>,
}

pub struct ConsultationService {
    store: Arc<dyn ConsultationStore>,
    calendar: Arc<dyn CalendarGateway>,
    feed: ChangeFeed,
    lifecycle: StatusLifecycle,
    checker: ConflictChecker,
    time_zone: String,
    offset: FixedOffset,
}

impl ConsultationService {
    pub fn new(
        store: Arc<dyn ConsultationStore>,
        calendar: Arc<dyn CalendarGateway>,
        feed: ChangeFeed,
        time_zone: impl Into<String>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            calendar,
            feed,
            lifecycle: StatusLifecycle::new(),
            checker: ConflictChecker::new(),
            time_zone: time_zone.into(),
            offset,
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn time_zone(&self) -> &str {
        &self.time_zone
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub async fn health_check(&self) -> Result<(), DomainError> {
        Ok(self.store.health_check().await?)
    }

    /// Files a new pending request on behalf of a student.
    pub async fn request(
        &self,
        actor: &Actor,
        draft: NewConsultation,
    ) -> Result<ConsultationRecord, DomainError> {
        if actor.is_staff() {
            return Err(DomainError::authorization(
                "Only students can request consultations",
            ));
        }

        let record = self.lifecycle.create(draft, now())?;
        self.store.insert(&record).await?;

        tracing::info!(
            consultation_id = %record.id,
            teacher = %record.teacher.email,
            student = %record.student.email,
            scheduled_at = %record.scheduled_at,
            "Consultation requested"
        );
        self.feed.publish(ConsultationChange::Created(record.clone()));
        Ok(record)
    }

    /// A record the actor is party to.
    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<ConsultationRecord, DomainError> {
        let record = self.fetch(id).await?;
        if record.teacher.email != actor.email && record.student.email != actor.email {
            return Err(not_found(id));
        }
        Ok(record)
    }

    /// The actor's consultations, staff seeing theirs as teacher.
    pub async fn list(
        &self,
        actor: &Actor,
        status: Option<ConsultationStatus>,
        window: TimeWindow,
    ) -> Result<Vec<ConsultationRecord>, DomainError> {
        let mut filter = Self::filter_for(actor);
        filter.status = status;

        let now = Utc::now();
        let records = self.store.list(&filter).await?;
        Ok(records
            .into_iter()
            .filter(|r| window.contains(r, now))
            .collect())
    }

    /// Approved consultations of the actor grouped by local day.
    pub async fn agenda(&self, actor: &Actor) -> Result<Vec<AgendaDay>, DomainError> {
        let filter = Self::filter_for(actor).with_status(ConsultationStatus::Approved);
        let records = self.store.list(&filter).await?;
        Ok(group_by_day(records, self.offset))
    }

    pub async fn edit(
        &self,
        actor: &Actor,
        id: Uuid,
        edit: ConsultationEdit,
    ) -> Result<ConsultationRecord, DomainError> {
        let current = self.fetch(id).await?;
        let next = self.lifecycle.edit(&current, actor, edit, now())?;
        self.commit(&current, &next).await?;

        tracing::info!(
            consultation_id = %id,
            scheduled_at = %next.scheduled_at,
            "Consultation edited"
        );
        Ok(next)
    }

    /// Approves a pending request.
    ///
    /// The overlap check runs against approved records read from the store
    /// at this moment, and the write only lands if the record is still the
    /// version that was checked. The calendar is consulted and updated
    /// around that, never affecting the result.
    pub async fn approve(
        &self,
        actor: &Actor,
        id: Uuid,
        comment: Option<&str>,
        token: Option<&CalendarToken>,
    ) -> Result<ApprovalOutcome, DomainError> {
        let current = self.fetch(id).await?;
        self.lifecycle.ensure_can_decide(&current, actor)?;

        let external_busy = match token {
            Some(token) => self.external_busy(token, &current).await,
            None => Vec::new(),
        };

        let approved = self.approved_for(&current.teacher.email).await?;
        let next = match self
            .lifecycle
            .approve(&current, actor, comment, &approved, now())
        {
            Ok(next) => next,
            Err(err) => {
                if let DomainError::Conflict(detail) = &err {
                    tracing::info!(consultation_id = %id, conflict = %detail, "Approval blocked");
                }
                return Err(err);
            }
        };

        match self.commit(&current, &next).await {
            Ok(()) => {}
            Err(DomainError::Store(StoreError::Rejected(reason))) => {
                tracing::warn!(
                    consultation_id = %id,
                    reason = %reason,
                    "Store rejected approval"
                );
                return Err(self.explain_rejection(&next).await);
            }
            Err(err) => return Err(err),
        }

        tracing::info!(
            consultation_id = %id,
            teacher = %next.teacher.email,
            "Consultation approved"
        );

        let calendar = self.sync_calendar(token, &next).await;
        Ok(ApprovalOutcome {
            record: next,
            calendar,
            external_busy,
        })
    }

    pub async fn deny(
        &self,
        actor: &Actor,
        id: Uuid,
        reason: &str,
    ) -> Result<ConsultationRecord, DomainError> {
        let current = self.fetch(id).await?;
        let next = self.lifecycle.deny(&current, actor, reason, now())?;
        self.commit(&current, &next).await?;

        tracing::info!(consultation_id = %id, "Consultation denied");
        Ok(next)
    }

    /// Removes the owner's pending request.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<(), DomainError> {
        let current = self.fetch(id).await?;
        self.lifecycle.authorize_delete(&current, actor)?;

        if !self
            .store
            .delete_if(id, ExpectedVersion::of(&current))
            .await?
        {
            return Err(DomainError::Conflict(ConflictDetail::StaleWrite {
                consultation_id: id,
            }));
        }

        tracing::info!(consultation_id = %id, "Consultation deleted");
        self.feed.publish(ConsultationChange::Deleted(current));
        Ok(())
    }

    /// Busy intervals on the token holder's calendar overlapping a consultation
    /// starting at `start`.
    pub async fn check_free_busy(
        &self,
        token: Option<&CalendarToken>,
        start: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, CalendarError> {
        let query = FreeBusyQuery::for_interval(&BusyInterval::starting_at(start), &self.time_zone);
        self.calendar.query_free_busy(token, &query).await
    }

    /// Calls `callback` with the ordered records matching `filter` now, and
    /// again after every change that touches the filter, until the returned
    /// subscription is cancelled or dropped.
    pub fn watch<F>(&self, filter: ConsultationFilter, callback: F) -> Subscription
    where
        F: Fn(Vec<ConsultationRecord>) + Send + Sync + 'static,
    {
        // Subscribe before the first load so nothing committed in between is missed.
        let mut changes = self.feed.subscribe();
        let store = Arc::clone(&self.store);

        let handle = tokio::spawn(async move {
            deliver(store.as_ref(), &filter, &callback).await;
            loop {
                match changes.recv().await {
                    Ok(change) if change.touches(&filter) => {
                        deliver(store.as_ref(), &filter, &callback).await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Consultation watcher lagged, reloading");
                        deliver(store.as_ref(), &filter, &callback).await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Subscription::new(handle)
    }

    /// Records the actor is party to: as teacher for staff, as student otherwise.
    pub fn filter_for(actor: &Actor) -> ConsultationFilter {
        if actor.is_staff() {
            ConsultationFilter::for_teacher(&actor.email)
        } else {
            ConsultationFilter::for_student(&actor.email)
        }
    }

    async fn fetch(&self, id: Uuid) -> Result<ConsultationRecord, DomainError> {
        self.store.fetch(id).await?.ok_or_else(|| not_found(id))
    }

    async fn approved_for(
        &self,
        teacher_email: &str,
    ) -> Result<Vec<ConsultationRecord>, DomainError> {
        let filter =
            ConsultationFilter::for_teacher(teacher_email).with_status(ConsultationStatus::Approved);
        Ok(self.store.list(&filter).await?)
    }

    /// Conditional write of `next` over `current`, then publish.
    async fn commit(
        &self,
        current: &ConsultationRecord,
        next: &ConsultationRecord,
    ) -> Result<(), DomainError> {
        if !self
            .store
            .update_if(next, ExpectedVersion::of(current))
            .await?
        {
            tracing::info!(consultation_id = %current.id, "Stale consultation write");
            return Err(DomainError::Conflict(ConflictDetail::StaleWrite {
                consultation_id: current.id,
            }));
        }

        self.feed.publish(ConsultationChange::Updated {
            before: current.clone(),
            after: next.clone(),
        });
        Ok(())
    }

    /// Turns a store-level refusal into the overlap that caused it, if visible.
    async fn explain_rejection(&self, next: &ConsultationRecord) -> DomainError {
        let approved = match self.approved_for(&next.teacher.email).await {
            Ok(approved) => approved,
            Err(err) => return err,
        };
        match self.checker.ensure_free(next, &approved) {
            Err(err) => err,
            Ok(()) => DomainError::Conflict(ConflictDetail::StaleWrite {
                consultation_id: next.id,
            }),
        }
    }

    async fn external_busy(
        &self,
        token: &CalendarToken,
        record: &ConsultationRecord,
    ) -> Vec<BusyInterval> {
        match self.check_free_busy(Some(token), record.scheduled_at).await {
            Ok(busy) => {
                if !busy.is_empty() {
                    tracing::warn!(
                        consultation_id = %record.id,
                        busy_count = busy.len(),
                        "External calendar reports the slot as busy"
                    );
                }
                busy
            }
            Err(err) => {
                tracing::warn!(
                    consultation_id = %record.id,
                    error = %err,
                    "Free/busy check failed"
                );
                Vec::new()
            }
        }
    }

    async fn sync_calendar(
        &self,
        token: Option<&CalendarToken>,
        record: &ConsultationRecord,
    ) -> CalendarSync {
        if token.is_none() {
            return CalendarSync::Skipped;
        }

        let event = CalendarEvent::for_consultation(record, &self.time_zone);
        match self.calendar.create_event(token, &event).await {
            Ok(true) => CalendarSync::Created,
            Ok(false) => {
                tracing::warn!(consultation_id = %record.id, "Calendar declined event");
                CalendarSync::Rejected
            }
            Err(err) => {
                tracing::warn!(
                    consultation_id = %record.id,
                    error = %err,
                    "Calendar event creation failed"
                );
                CalendarSync::Failed(err.to_string())
            }
        }
    }
}

async fn deliver<F>(store: &dyn ConsultationStore, filter: &ConsultationFilter, callback: &F)
where
    F: Fn(Vec<ConsultationRecord>),
{
    match store.list(filter).await {
        Ok(records) => callback(records),
        Err(err) => tracing::warn!(error = %err, "Consultation watcher reload failed"),
    }
}

fn not_found(id: Uuid) -> DomainError {
    DomainError::NotFound(format!("Consultation {}", id))
}

/// Store timestamps carry microseconds, so compare-and-set versions must too.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::consultation::{StudentRef, TeacherRef};
    use crate::models::user::Role;
    use crate::services::calendar::MockCalendarGateway;
    use crate::services::store::InMemoryConsultationStore;
    use chrono::{Duration, TimeZone};
    use std::time::Duration as StdDuration;
    use tokio::sync::mpsc;

    fn sgt_offset() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    /// A time on a day safely in the future, in Singapore local time.
    fn slot(hour: u32, minute: u32) -> DateTime<Utc> {
        let tomorrow = (Utc::now() + Duration::days(1)).date_naive();
        sgt_offset()
            .from_local_datetime(&tomorrow.and_hms_opt(hour, minute, 0).unwrap())
            .unwrap()
            .with_timezone(&Utc)
    }

    fn teacher() -> Actor {
        Actor::new("uid-tan", "tan@sst.edu.sg", Role::Staff)
    }

    fn student() -> Actor {
        Actor::new("uid-jane", "jane@s2024.ssts.edu.sg", Role::Student)
    }

    fn draft(scheduled_at: DateTime<Utc>) -> NewConsultation {
        NewConsultation {
            teacher: Some(TeacherRef::new("Mr Tan", "tan@sst.edu.sg")),
            student: Some(StudentRef::new("jane@s2024.ssts.edu.sg", "uid-jane")),
            scheduled_at: Some(scheduled_at),
            location: "Online".to_string(),
            comment: "Chemistry".to_string(),
        }
    }

    fn service_with(
        store: Arc<dyn ConsultationStore>,
        gateway: MockCalendarGateway,
    ) -> ConsultationService {
        ConsultationService::new(
            store,
            Arc::new(gateway),
            ChangeFeed::default(),
            "Asia/Singapore",
            sgt_offset(),
        )
    }

    fn service() -> ConsultationService {
        service_with(
            Arc::new(InMemoryConsultationStore::new()),
            MockCalendarGateway::new(),
        )
    }

    fn token() -> CalendarToken {
        CalendarToken::parse("token").unwrap()
    }

    #[tokio::test]
    async fn test_request_then_delete() {
        let service = service();
        let record = service.request(&student(), draft(slot(9, 0))).await.unwrap();

        assert_eq!(record.status, ConsultationStatus::Pending);
        assert_eq!(record.reason, "");

        service.delete(&student(), record.id).await.unwrap();
        assert!(matches!(
            service.get(&student(), record.id).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_staff_cannot_request() {
        let service = service();
        assert!(matches!(
            service.request(&teacher(), draft(slot(9, 0))).await,
            Err(DomainError::Authorization(_))
        ));
    }

    #[tokio::test]
    async fn test_approval_conflict_scenario() {
        let service = service();
        let first = service.request(&student(), draft(slot(9, 0))).await.unwrap();
        let clash = service.request(&student(), draft(slot(9, 15))).await.unwrap();
        let adjacent = service.request(&student(), draft(slot(9, 30))).await.unwrap();

        service.approve(&teacher(), first.id, None, None).await.unwrap();

        let err = service
            .approve(&teacher(), clash.id, None, None)
            .await
            .unwrap_err();
        match err {
            DomainError::Conflict(ConflictDetail::Overlap {
                consultation_id,
                interval,
            }) => {
                assert_eq!(consultation_id, first.id);
                assert_eq!(interval, BusyInterval::starting_at(slot(9, 0)));
            }
            other => panic!("expected overlap, got {:?}", other),
        }
        let untouched = service.get(&teacher(), clash.id).await.unwrap();
        assert_eq!(untouched.status, ConsultationStatus::Pending);

        let outcome = service
            .approve(&teacher(), adjacent.id, Some("OK"), None)
            .await
            .unwrap();
        assert_eq!(outcome.record.status, ConsultationStatus::Approved);
        assert_eq!(outcome.record.reason, "OK");
        assert_eq!(outcome.calendar, CalendarSync::Skipped);

        let approved = service
            .list(&teacher(), Some(ConsultationStatus::Approved), TimeWindow::All)
            .await
            .unwrap();
        for (i, a) in approved.iter().enumerate() {
            for b in approved.iter().skip(i + 1) {
                assert!(!a.busy_interval().overlaps(&b.busy_interval()));
            }
        }
    }

    #[tokio::test]
    async fn test_approval_creates_calendar_event() {
        let gateway = MockCalendarGateway::new();
        let service = service_with(Arc::new(InMemoryConsultationStore::new()), gateway.clone());
        let record = service.request(&student(), draft(slot(10, 0))).await.unwrap();

        let outcome = service
            .approve(&teacher(), record.id, None, Some(&token()))
            .await
            .unwrap();

        assert_eq!(outcome.calendar, CalendarSync::Created);
        let events = gateway.created_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary, "Consultation with jane@s2024.ssts.edu.sg");
        assert_eq!(events[0].start, slot(10, 0));
        assert_eq!(events[0].end, slot(10, 30));
    }

    #[tokio::test]
    async fn test_calendar_failure_does_not_revert_approval() {
        let service = service_with(
            Arc::new(InMemoryConsultationStore::new()),
            MockCalendarGateway::failing(),
        );
        let record = service.request(&student(), draft(slot(10, 0))).await.unwrap();

        let outcome = service
            .approve(&teacher(), record.id, None, Some(&token()))
            .await
            .unwrap();

        assert!(matches!(outcome.calendar, CalendarSync::Failed(_)));
        let stored = service.get(&teacher(), record.id).await.unwrap();
        assert_eq!(stored.status, ConsultationStatus::Approved);
    }

    #[tokio::test]
    async fn test_external_busy_is_reported_but_does_not_block() {
        let gateway = MockCalendarGateway::with_busy(vec![BusyInterval::new(
            slot(11, 10),
            slot(11, 20),
        )]);
        let service = service_with(Arc::new(InMemoryConsultationStore::new()), gateway);
        let record = service.request(&student(), draft(slot(11, 0))).await.unwrap();

        let outcome = service
            .approve(&teacher(), record.id, None, Some(&token()))
            .await
            .unwrap();

        assert_eq!(outcome.record.status, ConsultationStatus::Approved);
        assert_eq!(outcome.external_busy.len(), 1);
    }

    #[tokio::test]
    async fn test_deny_and_delete_rules() {
        let service = service();
        let record = service.request(&student(), draft(slot(9, 0))).await.unwrap();

        assert!(matches!(
            service.deny(&teacher(), record.id, "  ").await,
            Err(DomainError::Validation(_))
        ));
        let denied = service
            .deny(&teacher(), record.id, "Not available")
            .await
            .unwrap();
        assert_eq!(denied.status, ConsultationStatus::Denied);

        assert!(matches!(
            service.delete(&student(), record.id).await,
            Err(DomainError::State(_))
        ));
        let stranger = Actor::new("uid-x", "x@s2024.ssts.edu.sg", Role::Student);
        assert!(matches!(
            service.delete(&stranger, record.id).await,
            Err(DomainError::Authorization(_))
        ));
    }

    #[tokio::test]
    async fn test_edit_updates_pending_record() {
        let service = service();
        let record = service.request(&student(), draft(slot(9, 0))).await.unwrap();

        let edited = service
            .edit(
                &student(),
                record.id,
                ConsultationEdit {
                    scheduled_at: Some(slot(14, 0)),
                    comment: "Moved".to_string(),
                    reason: Some("Clash".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(edited.status, ConsultationStatus::Pending);
        assert_eq!(service.get(&student(), record.id).await.unwrap(), edited);
    }

    #[tokio::test]
    async fn test_unrelated_actor_cannot_see_record() {
        let service = service();
        let record = service.request(&student(), draft(slot(9, 0))).await.unwrap();
        let other = Actor::new("uid-lim", "lim@sst.edu.sg", Role::Staff);
        assert!(matches!(
            service.get(&other, record.id).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_windows() {
        let service = service();
        let store = InMemoryConsultationStore::new();
        let past = ConsultationRecord {
            scheduled_at: Utc::now() - Duration::days(2),
            ..StatusLifecycle::new()
                .create(draft(slot(9, 0)), now())
                .unwrap()
        };
        store.insert(&past).await.unwrap();
        let service = ConsultationService {
            store: Arc::new(store),
            ..service
        };
        service.request(&student(), draft(slot(9, 0))).await.unwrap();

        let upcoming = service
            .list(&student(), None, TimeWindow::Upcoming)
            .await
            .unwrap();
        let history = service.list(&student(), None, TimeWindow::Past).await.unwrap();
        let all = service.list(&student(), None, TimeWindow::All).await.unwrap();

        assert_eq!(upcoming.len(), 1);
        assert_eq!(history, vec![past]);
        assert_eq!(all.len(), 2);
        assert!(all[0].scheduled_at < all[1].scheduled_at);
    }

    #[tokio::test]
    async fn test_agenda_groups_approved_by_day() {
        let service = service();
        let a = service.request(&student(), draft(slot(9, 0))).await.unwrap();
        let b = service.request(&student(), draft(slot(15, 0))).await.unwrap();
        service.request(&student(), draft(slot(16, 0))).await.unwrap();
        service.approve(&teacher(), a.id, None, None).await.unwrap();
        service.approve(&teacher(), b.id, None, None).await.unwrap();

        let agenda = service.agenda(&teacher()).await.unwrap();

        assert_eq!(agenda.len(), 1);
        let ids: Vec<Uuid> = agenda[0].consultations.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    /// Store whose conditional writes always find a newer version.
    struct RacingStore(InMemoryConsultationStore);

    #[async_trait::async_trait]
    impl ConsultationStore for RacingStore {
        async fn insert(&self, record: &ConsultationRecord) -> Result<(), StoreError> {
            self.0.insert(record).await
        }
        async fn fetch(&self, id: Uuid) -> Result<Option<ConsultationRecord>, StoreError> {
            self.0.fetch(id).await
        }
        async fn list(
            &self,
            filter: &ConsultationFilter,
        ) -> Result<Vec<ConsultationRecord>, StoreError> {
            self.0.list(filter).await
        }
        async fn update_if(
            &self,
            _record: &ConsultationRecord,
            _expected: ExpectedVersion,
        ) -> Result<bool, StoreError> {
            Ok(false)
        }
        async fn delete_if(
            &self,
            _id: Uuid,
            _expected: ExpectedVersion,
        ) -> Result<bool, StoreError> {
            Ok(false)
        }
        async fn health_check(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stale_write_aborts_with_conflict() {
        let gateway = MockCalendarGateway::new();
        let service = service_with(
            Arc::new(RacingStore(InMemoryConsultationStore::new())),
            gateway.clone(),
        );
        let record = service.request(&student(), draft(slot(9, 0))).await.unwrap();

        let err = service
            .approve(&teacher(), record.id, None, Some(&token()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Conflict(ConflictDetail::StaleWrite { .. })
        ));
        assert!(gateway.created_events().is_empty());

        assert!(matches!(
            service.delete(&student(), record.id).await,
            Err(DomainError::Conflict(ConflictDetail::StaleWrite { .. }))
        ));
    }

    async fn next_snapshot(
        rx: &mut mpsc::UnboundedReceiver<Vec<ConsultationRecord>>,
    ) -> Vec<ConsultationRecord> {
        tokio::time::timeout(StdDuration::from_secs(2), rx.recv())
            .await
            .expect("snapshot in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_watch_delivers_snapshots_until_cancelled() {
        let service = service();
        let existing = service.request(&student(), draft(slot(9, 0))).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = service.watch(
            ConsultationFilter::for_teacher("tan@sst.edu.sg"),
            move |records| {
                let _ = tx.send(records);
            },
        );

        let initial = next_snapshot(&mut rx).await;
        assert_eq!(initial, vec![existing.clone()]);

        let added = service.request(&student(), draft(slot(10, 0))).await.unwrap();
        let refreshed = next_snapshot(&mut rx).await;
        assert_eq!(refreshed, vec![existing, added]);

        subscription.cancel();
        tokio::task::yield_now().await;
        service.request(&student(), draft(slot(11, 0))).await.unwrap();

        let after_cancel = tokio::time::timeout(StdDuration::from_millis(200), rx.recv()).await;
        assert!(!matches!(after_cancel, Ok(Some(_))));
    }

    #[tokio::test]
    async fn test_watch_ignores_unrelated_changes() {
        let service = service();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = service.watch(
            ConsultationFilter::for_teacher("lim@sst.edu.sg"),
            move |records| {
                let _ = tx.send(records);
            },
        );

        assert!(next_snapshot(&mut rx).await.is_empty());
        service.request(&student(), draft(slot(9, 0))).await.unwrap();

        let nothing = tokio::time::timeout(StdDuration::from_millis(200), rx.recv()).await;
        assert!(nothing.is_err());
    }
}
