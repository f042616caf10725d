use chrono::{DateTime, Utc};
use color_eyre::Result;

use crate::db::models::{AuthUser, Desafio, Submission};
use crate::db::Db;
use crate::names;
use crate::xp::{rules, Rewards};

// ---------------------------------------------------------------------------
// ChallengeRepository trait (DIP: service defines the abstraction it needs)
// ---------------------------------------------------------------------------

#[cfg_attr(test, mockall::automock)]
pub trait ChallengeRepository: Send + Sync {
    fn find_desafio(
        &self,
        desafio_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<Desafio>>> + Send;

    fn find_submission(
        &self,
        submission_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<Submission>>> + Send;

    fn is_assigned(
        &self,
        user_id: i64,
        desafio_id: i64,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    fn is_completed(
        &self,
        user_id: i64,
        desafio_id: i64,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    fn has_pending_submission(
        &self,
        user_id: i64,
        desafio_id: i64,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// `false` when the user already holds an active assignment.
    fn insert_assignment(
        &self,
        user_id: i64,
        desafio_id: i64,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    fn insert_submission(
        &self,
        user_id: i64,
        desafio_id: i64,
        content: &str,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<i64>> + Send;

    /// Move a pending submission to `aprovado`, mark the progress record and
    /// award `reward` unless the progress record was already complete.
    /// `None` when the submission was no longer pending, otherwise the XP
    /// awarded.
    fn approve_submission(
        &self,
        submission: &Submission,
        reviewer_id: i64,
        feedback: Option<String>,
        reward: i64,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Option<i64>>> + Send;

    /// Move a pending submission to `rejeitado`. `false` when it was no
    /// longer pending.
    fn reject_submission(
        &self,
        submission: &Submission,
        reviewer_id: i64,
        feedback: Option<String>,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Move a `pendente`/`rejeitado` submission to `desistiu`, take the
    /// penalty (capped at the user's current XP) and drop the active
    /// assignment. Returns the amount written to the ledger, `None` when the
    /// submission was in any other state.
    fn abandon_submission(
        &self,
        submission: &Submission,
        penalty: i64,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Option<i64>>> + Send;
}

// ---------------------------------------------------------------------------
// Outcome enums
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
pub enum AssignOutcome {
    Assigned,
    NotFound,
    NotStudent,
    AlreadyAssigned,
    AlreadyCompleted,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted(i64),
    NotFound,
    EmptyContent,
    NotAssigned,
    AlreadyCompleted,
    PendingExists,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ReviewOutcome {
    Approved { user_id: i64, xp_awarded: i64 },
    Rejected,
    NotFound,
    /// The submission was already reviewed or abandoned.
    NotPending,
}

#[derive(Debug, PartialEq, Eq)]
pub enum AbandonOutcome {
    Abandoned { penalty: i64 },
    NotFound,
    NotOwner,
    /// Approved or already abandoned.
    InvalidState,
}

// ---------------------------------------------------------------------------
// ChallengeService
// ---------------------------------------------------------------------------

pub struct ChallengeService<R: ChallengeRepository = Db> {
    repo: R,
    rewards: Rewards,
}

impl<R: ChallengeRepository + Clone> Clone for ChallengeService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            rewards: self.rewards,
        }
    }
}

impl<R: ChallengeRepository> ChallengeService<R> {
    pub fn new(repo: R, rewards: Rewards) -> Self {
        Self { repo, rewards }
    }

    pub async fn assign(&self, user: &AuthUser, desafio_id: i64) -> Result<AssignOutcome> {
        if user.role != names::ROLE_STUDENT {
            return Ok(AssignOutcome::NotStudent);
        }
        if self.repo.find_desafio(desafio_id).await?.is_none() {
            return Ok(AssignOutcome::NotFound);
        }
        if self.repo.is_completed(user.id, desafio_id).await? {
            return Ok(AssignOutcome::AlreadyCompleted);
        }

        if !self
            .repo
            .insert_assignment(user.id, desafio_id, Utc::now())
            .await?
        {
            return Ok(AssignOutcome::AlreadyAssigned);
        }
        Ok(AssignOutcome::Assigned)
    }

    pub async fn submit(&self, user_id: i64, desafio_id: i64, content: &str) -> Result<SubmitOutcome> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(SubmitOutcome::EmptyContent);
        }
        if self.repo.find_desafio(desafio_id).await?.is_none() {
            return Ok(SubmitOutcome::NotFound);
        }
        if !self.repo.is_assigned(user_id, desafio_id).await? {
            return Ok(SubmitOutcome::NotAssigned);
        }
        if self.repo.is_completed(user_id, desafio_id).await? {
            return Ok(SubmitOutcome::AlreadyCompleted);
        }
        if self.repo.has_pending_submission(user_id, desafio_id).await? {
            return Ok(SubmitOutcome::PendingExists);
        }

        let submission_id = self
            .repo
            .insert_submission(user_id, desafio_id, content, Utc::now())
            .await?;
        Ok(SubmitOutcome::Submitted(submission_id))
    }

    pub async fn approve(
        &self,
        reviewer_id: i64,
        submission_id: i64,
        feedback: Option<String>,
    ) -> Result<ReviewOutcome> {
        let Some(submission) = self.repo.find_submission(submission_id).await? else {
            return Ok(ReviewOutcome::NotFound);
        };
        if submission.status != names::STATUS_PENDENTE {
            return Ok(ReviewOutcome::NotPending);
        }

        match self
            .repo
            .approve_submission(
                &submission,
                reviewer_id,
                feedback,
                self.rewards.desafio_completo,
                Utc::now(),
            )
            .await?
        {
            Some(xp_awarded) => Ok(ReviewOutcome::Approved {
                user_id: submission.user_id,
                xp_awarded,
            }),
            None => Ok(ReviewOutcome::NotPending),
        }
    }

    pub async fn reject(
        &self,
        reviewer_id: i64,
        submission_id: i64,
        feedback: Option<String>,
    ) -> Result<ReviewOutcome> {
        let Some(submission) = self.repo.find_submission(submission_id).await? else {
            return Ok(ReviewOutcome::NotFound);
        };
        if submission.status != names::STATUS_PENDENTE {
            return Ok(ReviewOutcome::NotPending);
        }

        if self
            .repo
            .reject_submission(&submission, reviewer_id, feedback, Utc::now())
            .await?
        {
            Ok(ReviewOutcome::Rejected)
        } else {
            Ok(ReviewOutcome::NotPending)
        }
    }

    pub async fn abandon(&self, user_id: i64, submission_id: i64) -> Result<AbandonOutcome> {
        let Some(submission) = self.repo.find_submission(submission_id).await? else {
            return Ok(AbandonOutcome::NotFound);
        };
        if submission.user_id != user_id {
            return Ok(AbandonOutcome::NotOwner);
        }
        if submission.status != names::STATUS_PENDENTE
            && submission.status != names::STATUS_REJEITADO
        {
            return Ok(AbandonOutcome::InvalidState);
        }

        let penalty = rules::abandon_penalty(&self.rewards);
        match self
            .repo
            .abandon_submission(&submission, penalty, Utc::now())
            .await?
        {
            Some(applied) => Ok(AbandonOutcome::Abandoned { penalty: applied }),
            None => Ok(AbandonOutcome::InvalidState),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
