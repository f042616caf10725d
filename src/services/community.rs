use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use color_eyre::Result;

use crate::db::models::{Pergunta, Resposta};
use crate::db::Db;
use crate::xp::rules::{self, AnswerStake};
use crate::xp::Rewards;

// ---------------------------------------------------------------------------
// CommunityRepository trait (DIP: service defines the abstraction it needs)
// ---------------------------------------------------------------------------

#[cfg_attr(test, mockall::automock)]
pub trait CommunityRepository: Send + Sync {
    fn find_pergunta(
        &self,
        pergunta_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<Pergunta>>> + Send;

    fn find_resposta(
        &self,
        resposta_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<Resposta>>> + Send;

    fn respostas_for(
        &self,
        pergunta_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<Resposta>>> + Send;

    fn has_comments(
        &self,
        resposta_id: i64,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Insert the question and award its author in one transaction.
    fn insert_pergunta(
        &self,
        author_id: i64,
        title: &str,
        body: &str,
        award: i64,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<i64>> + Send;

    /// Insert a response (or comment when `parent_id` is set) and award its
    /// author `award` in one transaction.
    fn insert_resposta(
        &self,
        pergunta: &Pergunta,
        author_id: i64,
        parent_id: Option<i64>,
        body: &str,
        award: i64,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<i64>> + Send;

    /// Mark the response accepted and top its author up to `target`.
    /// `None` when another response of the question is already accepted,
    /// otherwise the XP actually awarded (0 when re-accepting).
    fn accept_resposta(
        &self,
        resposta: &Resposta,
        target: i64,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Option<i64>>> + Send;

    /// Delete a response with its votes and ledger rows, then refresh the
    /// author's totals. Returns the XP removed from the author.
    fn delete_resposta(
        &self,
        resposta: &Resposta,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<i64>> + Send;

    /// Delete a question with everything under it and revert the XP tied to
    /// it, in one transaction. Returns the XP removed per user, summed from
    /// the deleted ledger rows.
    fn delete_pergunta(
        &self,
        pergunta: &Pergunta,
        respostas: &[Resposta],
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<BTreeMap<i64, i64>>> + Send;

    fn upsert_vote(
        &self,
        resposta_id: i64,
        user_id: i64,
        value: i64,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

// ---------------------------------------------------------------------------
// Outcome enums
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
pub enum AskOutcome {
    Created { pergunta_id: i64, xp_awarded: i64 },
    EmptyFields,
}

#[derive(Debug, PartialEq, Eq)]
pub enum AnswerOutcome {
    Created { resposta_id: i64, xp_awarded: i64 },
    EmptyBody,
    PerguntaNotFound,
    /// The parent response does not exist or belongs to another question.
    ParentNotFound,
    /// Comments can only hang under a direct response.
    NestedComment,
}

#[derive(Debug, PartialEq, Eq)]
pub enum AcceptOutcome {
    Accepted { author_id: i64, xp_awarded: i64 },
    NotFound,
    NotQuestionAuthor,
    OwnAnswer,
    IsComment,
    OtherAlreadyAccepted,
}

#[derive(Debug, PartialEq, Eq)]
pub enum DeleteAnswerOutcome {
    Deleted { xp_reverted: i64 },
    NotFound,
    NotAuthor,
    IsAccepted,
    HasComments,
}

#[derive(Debug, PartialEq, Eq)]
pub enum DeleteQuestionOutcome {
    /// XP reverted per user id.
    Deleted { reverted: BTreeMap<i64, i64> },
    NotFound,
    Forbidden,
}

#[derive(Debug, PartialEq, Eq)]
pub enum VoteOutcome {
    Recorded,
    NotFound,
    InvalidValue,
    OwnAnswer,
}

// ---------------------------------------------------------------------------
// CommunityService
// ---------------------------------------------------------------------------

pub struct CommunityService<R: CommunityRepository = Db> {
    repo: R,
    rewards: Rewards,
}

impl<R: CommunityRepository + Clone> Clone for CommunityService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            rewards: self.rewards,
        }
    }
}

impl<R: CommunityRepository> CommunityService<R> {
    pub fn new(repo: R, rewards: Rewards) -> Self {
        Self { repo, rewards }
    }

    pub async fn ask(&self, author_id: i64, title: &str, body: &str) -> Result<AskOutcome> {
        let title = title.trim();
        let body = body.trim();
        if title.is_empty() || body.is_empty() {
            return Ok(AskOutcome::EmptyFields);
        }

        let award = self.rewards.pergunta;
        let pergunta_id = self
            .repo
            .insert_pergunta(author_id, title, body, award, Utc::now())
            .await?;

        Ok(AskOutcome::Created {
            pergunta_id,
            xp_awarded: award,
        })
    }

    pub async fn answer(
        &self,
        author_id: i64,
        pergunta_id: i64,
        parent_id: Option<i64>,
        body: &str,
    ) -> Result<AnswerOutcome> {
        let body = body.trim();
        if body.is_empty() {
            return Ok(AnswerOutcome::EmptyBody);
        }

        let Some(pergunta) = self.repo.find_pergunta(pergunta_id).await? else {
            return Ok(AnswerOutcome::PerguntaNotFound);
        };

        if let Some(parent_id) = parent_id {
            match self.repo.find_resposta(parent_id).await? {
                Some(parent) if parent.pergunta_id != pergunta.id => {
                    return Ok(AnswerOutcome::ParentNotFound)
                }
                Some(parent) if !parent.is_direct() => return Ok(AnswerOutcome::NestedComment),
                Some(_) => {}
                None => return Ok(AnswerOutcome::ParentNotFound),
            }
        }

        // comments under a response earn nothing
        let award = if parent_id.is_none() {
            self.rewards.resposta
        } else {
            0
        };

        let resposta_id = self
            .repo
            .insert_resposta(&pergunta, author_id, parent_id, body, award, Utc::now())
            .await?;

        Ok(AnswerOutcome::Created {
            resposta_id,
            xp_awarded: award,
        })
    }

    pub async fn accept(&self, caller_id: i64, resposta_id: i64) -> Result<AcceptOutcome> {
        let Some(resposta) = self.repo.find_resposta(resposta_id).await? else {
            return Ok(AcceptOutcome::NotFound);
        };
        let Some(pergunta) = self.repo.find_pergunta(resposta.pergunta_id).await? else {
            return Ok(AcceptOutcome::NotFound);
        };

        if pergunta.user_id != caller_id {
            return Ok(AcceptOutcome::NotQuestionAuthor);
        }
        if resposta.user_id == caller_id {
            return Ok(AcceptOutcome::OwnAnswer);
        }
        if !resposta.is_direct() {
            return Ok(AcceptOutcome::IsComment);
        }

        match self
            .repo
            .accept_resposta(&resposta, self.rewards.resposta_certa, Utc::now())
            .await?
        {
            Some(xp_awarded) => Ok(AcceptOutcome::Accepted {
                author_id: resposta.user_id,
                xp_awarded,
            }),
            None => Ok(AcceptOutcome::OtherAlreadyAccepted),
        }
    }

    pub async fn delete_answer(&self, caller_id: i64, resposta_id: i64) -> Result<DeleteAnswerOutcome> {
        let Some(resposta) = self.repo.find_resposta(resposta_id).await? else {
            return Ok(DeleteAnswerOutcome::NotFound);
        };

        if resposta.user_id != caller_id {
            return Ok(DeleteAnswerOutcome::NotAuthor);
        }
        if resposta.is_accepted {
            return Ok(DeleteAnswerOutcome::IsAccepted);
        }
        if self.repo.has_comments(resposta.id).await? {
            return Ok(DeleteAnswerOutcome::HasComments);
        }

        let xp_reverted = self.repo.delete_resposta(&resposta, Utc::now()).await?;
        Ok(DeleteAnswerOutcome::Deleted { xp_reverted })
    }

    pub async fn delete_question(
        &self,
        caller_id: i64,
        caller_is_admin: bool,
        pergunta_id: i64,
    ) -> Result<DeleteQuestionOutcome> {
        let Some(pergunta) = self.repo.find_pergunta(pergunta_id).await? else {
            return Ok(DeleteQuestionOutcome::NotFound);
        };

        if pergunta.user_id != caller_id && !caller_is_admin {
            return Ok(DeleteQuestionOutcome::Forbidden);
        }

        let respostas = self.repo.respostas_for(pergunta.id).await?;
        let stakes: Vec<AnswerStake> = respostas
            .iter()
            .filter(|r| r.is_direct())
            .map(|r| AnswerStake {
                author_id: r.user_id,
                accepted: r.is_accepted,
            })
            .collect();
        let planned = rules::question_revert_plan(pergunta.user_id, &stakes, &self.rewards);

        let reverted = self
            .repo
            .delete_pergunta(&pergunta, &respostas, Utc::now())
            .await?;
        if reverted != planned {
            tracing::warn!(
                "pergunta {} reverted {reverted:?}, current rewards would give {planned:?}",
                pergunta.id
            );
        }

        tracing::info!(
            "pergunta {} deleted by user_id={caller_id}, xp reverted: {reverted:?}",
            pergunta.id
        );
        Ok(DeleteQuestionOutcome::Deleted { reverted })
    }

    pub async fn vote(&self, user_id: i64, resposta_id: i64, value: i64) -> Result<VoteOutcome> {
        if value != 1 && value != -1 {
            return Ok(VoteOutcome::InvalidValue);
        }

        let Some(resposta) = self.repo.find_resposta(resposta_id).await? else {
            return Ok(VoteOutcome::NotFound);
        };
        if resposta.user_id == user_id {
            return Ok(VoteOutcome::OwnAnswer);
        }

        self.repo
            .upsert_vote(resposta.id, user_id, value, Utc::now())
            .await?;
        Ok(VoteOutcome::Recorded)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn service(mock: MockCommunityRepository) -> CommunityService<MockCommunityRepository> {
        CommunityService::new(mock, Rewards::default())
    }

    fn pergunta(id: i64, author: i64) -> Pergunta {
        Pergunta {
            id,
            user_id: author,
            title: "Como usar lifetimes?".to_string(),
            body: "Não entendo o erro E0106".to_string(),
            created_at: Utc::now(),
        }
    }

    fn resposta(id: i64, pergunta_id: i64, author: i64) -> Resposta {
        Resposta {
            id,
            pergunta_id,
            user_id: author,
            parent_id: None,
            body: "Use uma anotação explícita".to_string(),
            is_accepted: false,
            created_at: Utc::now(),
        }
    }

    // ----- ask tests -----

    #[tokio::test]
    async fn ask_awards_question_reward() {
        let mut mock = MockCommunityRepository::new();
        mock.expect_insert_pergunta()
            .withf(|author, title, _, award, _| *author == 1 && title == "Título" && *award == 5)
            .returning(|_, _, _, _, _| Box::pin(async { Ok(10) }));

        let outcome = service(mock).ask(1, "  Título ", "Corpo").await.unwrap();
        assert_eq!(
            outcome,
            AskOutcome::Created {
                pergunta_id: 10,
                xp_awarded: 5
            }
        );
    }

    #[tokio::test]
    async fn ask_empty_fields_returns_empty_fields() {
        let outcome = service(MockCommunityRepository::new())
            .ask(1, "   ", "Corpo")
            .await
            .unwrap();
        assert_eq!(outcome, AskOutcome::EmptyFields);
    }

    // ----- answer tests -----

    #[tokio::test]
    async fn direct_answer_awards_base_reward() {
        let mut mock = MockCommunityRepository::new();
        mock.expect_find_pergunta()
            .returning(|id| Box::pin(async move { Ok(Some(pergunta(id, 1))) }));
        mock.expect_insert_resposta()
            .withf(|_, author, parent, _, award, _| *author == 2 && parent.is_none() && *award == 1)
            .returning(|_, _, _, _, _, _| Box::pin(async { Ok(20) }));

        let outcome = service(mock).answer(2, 10, None, "Resposta").await.unwrap();
        assert_eq!(
            outcome,
            AnswerOutcome::Created {
                resposta_id: 20,
                xp_awarded: 1
            }
        );
    }

    #[tokio::test]
    async fn comment_awards_nothing() {
        let mut mock = MockCommunityRepository::new();
        mock.expect_find_pergunta()
            .returning(|id| Box::pin(async move { Ok(Some(pergunta(id, 1))) }));
        mock.expect_find_resposta()
            .returning(|id| Box::pin(async move { Ok(Some(resposta(id, 10, 3))) }));
        mock.expect_insert_resposta()
            .withf(|_, _, parent, _, award, _| *parent == Some(20) && *award == 0)
            .returning(|_, _, _, _, _, _| Box::pin(async { Ok(21) }));

        let outcome = service(mock)
            .answer(2, 10, Some(20), "Comentário")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            AnswerOutcome::Created {
                resposta_id: 21,
                xp_awarded: 0
            }
        );
    }

    #[tokio::test]
    async fn comment_on_comment_is_refused() {
        let mut mock = MockCommunityRepository::new();
        mock.expect_find_pergunta()
            .returning(|id| Box::pin(async move { Ok(Some(pergunta(id, 1))) }));
        mock.expect_find_resposta().returning(|id| {
            Box::pin(async move {
                let mut comment = resposta(id, 10, 3);
                comment.parent_id = Some(5);
                Ok(Some(comment))
            })
        });

        let outcome = service(mock)
            .answer(2, 10, Some(21), "Comentário")
            .await
            .unwrap();
        assert_eq!(outcome, AnswerOutcome::NestedComment);
    }

    #[tokio::test]
    async fn parent_from_other_question_is_not_found() {
        let mut mock = MockCommunityRepository::new();
        mock.expect_find_pergunta()
            .returning(|id| Box::pin(async move { Ok(Some(pergunta(id, 1))) }));
        mock.expect_find_resposta()
            .returning(|id| Box::pin(async move { Ok(Some(resposta(id, 99, 3))) }));

        let outcome = service(mock).answer(2, 10, Some(20), "x").await.unwrap();
        assert_eq!(outcome, AnswerOutcome::ParentNotFound);
    }

    #[tokio::test]
    async fn answer_unknown_question_returns_not_found() {
        let mut mock = MockCommunityRepository::new();
        mock.expect_find_pergunta()
            .returning(|_| Box::pin(async { Ok(None) }));

        let outcome = service(mock).answer(2, 10, None, "x").await.unwrap();
        assert_eq!(outcome, AnswerOutcome::PerguntaNotFound);
    }

    // ----- accept tests -----

    #[tokio::test]
    async fn accept_tops_up_to_accepted_reward() {
        let mut mock = MockCommunityRepository::new();
        mock.expect_find_resposta()
            .returning(|id| Box::pin(async move { Ok(Some(resposta(id, 10, 2))) }));
        mock.expect_find_pergunta()
            .returning(|id| Box::pin(async move { Ok(Some(pergunta(id, 1))) }));
        mock.expect_accept_resposta()
            .withf(|r, target, _| r.id == 20 && *target == 30)
            .returning(|_, _, _| Box::pin(async { Ok(Some(29)) }));

        let outcome = service(mock).accept(1, 20).await.unwrap();
        assert_eq!(
            outcome,
            AcceptOutcome::Accepted {
                author_id: 2,
                xp_awarded: 29
            }
        );
    }

    #[tokio::test]
    async fn accept_by_non_author_is_refused() {
        let mut mock = MockCommunityRepository::new();
        mock.expect_find_resposta()
            .returning(|id| Box::pin(async move { Ok(Some(resposta(id, 10, 2))) }));
        mock.expect_find_pergunta()
            .returning(|id| Box::pin(async move { Ok(Some(pergunta(id, 1))) }));

        let outcome = service(mock).accept(3, 20).await.unwrap();
        assert_eq!(outcome, AcceptOutcome::NotQuestionAuthor);
    }

    #[tokio::test]
    async fn accept_own_answer_is_refused() {
        let mut mock = MockCommunityRepository::new();
        mock.expect_find_resposta()
            .returning(|id| Box::pin(async move { Ok(Some(resposta(id, 10, 1))) }));
        mock.expect_find_pergunta()
            .returning(|id| Box::pin(async move { Ok(Some(pergunta(id, 1))) }));

        let outcome = service(mock).accept(1, 20).await.unwrap();
        assert_eq!(outcome, AcceptOutcome::OwnAnswer);
    }

    #[tokio::test]
    async fn accept_when_other_accepted_is_conflict() {
        let mut mock = MockCommunityRepository::new();
        mock.expect_find_resposta()
            .returning(|id| Box::pin(async move { Ok(Some(resposta(id, 10, 2))) }));
        mock.expect_find_pergunta()
            .returning(|id| Box::pin(async move { Ok(Some(pergunta(id, 1))) }));
        mock.expect_accept_resposta()
            .returning(|_, _, _| Box::pin(async { Ok(None) }));

        let outcome = service(mock).accept(1, 20).await.unwrap();
        assert_eq!(outcome, AcceptOutcome::OtherAlreadyAccepted);
    }

    // ----- delete answer tests -----

    #[tokio::test]
    async fn delete_accepted_answer_is_refused() {
        let mut mock = MockCommunityRepository::new();
        mock.expect_find_resposta().returning(|id| {
            Box::pin(async move {
                let mut accepted = resposta(id, 10, 2);
                accepted.is_accepted = true;
                Ok(Some(accepted))
            })
        });
        mock.expect_delete_resposta().never();

        let outcome = service(mock).delete_answer(2, 20).await.unwrap();
        assert_eq!(outcome, DeleteAnswerOutcome::IsAccepted);
    }

    #[tokio::test]
    async fn delete_answer_with_comments_is_refused() {
        let mut mock = MockCommunityRepository::new();
        mock.expect_find_resposta()
            .returning(|id| Box::pin(async move { Ok(Some(resposta(id, 10, 2))) }));
        mock.expect_has_comments()
            .returning(|_| Box::pin(async { Ok(true) }));
        mock.expect_delete_resposta().never();

        let outcome = service(mock).delete_answer(2, 20).await.unwrap();
        assert_eq!(outcome, DeleteAnswerOutcome::HasComments);
    }

    #[tokio::test]
    async fn delete_answer_by_other_user_is_refused() {
        let mut mock = MockCommunityRepository::new();
        mock.expect_find_resposta()
            .returning(|id| Box::pin(async move { Ok(Some(resposta(id, 10, 2))) }));

        let outcome = service(mock).delete_answer(3, 20).await.unwrap();
        assert_eq!(outcome, DeleteAnswerOutcome::NotAuthor);
    }

    #[tokio::test]
    async fn delete_answer_reverts_xp() {
        let mut mock = MockCommunityRepository::new();
        mock.expect_find_resposta()
            .returning(|id| Box::pin(async move { Ok(Some(resposta(id, 10, 2))) }));
        mock.expect_has_comments()
            .returning(|_| Box::pin(async { Ok(false) }));
        mock.expect_delete_resposta()
            .returning(|_, _| Box::pin(async { Ok(1) }));

        let outcome = service(mock).delete_answer(2, 20).await.unwrap();
        assert_eq!(outcome, DeleteAnswerOutcome::Deleted { xp_reverted: 1 });
    }

    // ----- delete question tests -----

    #[tokio::test]
    async fn delete_question_reports_revert_plan() {
        let mut mock = MockCommunityRepository::new();
        mock.expect_find_pergunta()
            .returning(|id| Box::pin(async move { Ok(Some(pergunta(id, 1))) }));
        mock.expect_respostas_for().returning(|id| {
            Box::pin(async move {
                let mut accepted = resposta(20, id, 2);
                accepted.is_accepted = true;
                let mut comment = resposta(22, id, 4);
                comment.parent_id = Some(20);
                Ok(vec![accepted, resposta(21, id, 3), comment])
            })
        });
        mock.expect_delete_pergunta()
            .withf(|p, respostas, _| p.id == 10 && respostas.len() == 3)
            .returning(|_, _, _| {
                Box::pin(async { Ok(BTreeMap::from([(1, 5), (2, 30), (3, 1)])) })
            });

        let outcome = service(mock).delete_question(1, false, 10).await.unwrap();
        let expected = BTreeMap::from([(1, 5), (2, 30), (3, 1)]);
        assert_eq!(outcome, DeleteQuestionOutcome::Deleted { reverted: expected });
    }

    #[tokio::test]
    async fn delete_question_reports_what_the_ledger_held() {
        let mut mock = MockCommunityRepository::new();
        mock.expect_find_pergunta()
            .returning(|id| Box::pin(async move { Ok(Some(pergunta(id, 1))) }));
        mock.expect_respostas_for()
            .returning(|id| Box::pin(async move { Ok(vec![resposta(20, id, 2)]) }));
        // awarded while the question reward was 3
        mock.expect_delete_pergunta()
            .returning(|_, _, _| Box::pin(async { Ok(BTreeMap::from([(1, 3), (2, 1)])) }));

        let outcome = service(mock).delete_question(1, false, 10).await.unwrap();
        let expected = BTreeMap::from([(1, 3), (2, 1)]);
        assert_eq!(outcome, DeleteQuestionOutcome::Deleted { reverted: expected });
    }

    #[tokio::test]
    async fn delete_question_by_stranger_is_forbidden() {
        let mut mock = MockCommunityRepository::new();
        mock.expect_find_pergunta()
            .returning(|id| Box::pin(async move { Ok(Some(pergunta(id, 1))) }));
        mock.expect_delete_pergunta().never();

        let outcome = service(mock).delete_question(2, false, 10).await.unwrap();
        assert_eq!(outcome, DeleteQuestionOutcome::Forbidden);
    }

    #[tokio::test]
    async fn admin_can_delete_any_question() {
        let mut mock = MockCommunityRepository::new();
        mock.expect_find_pergunta()
            .returning(|id| Box::pin(async move { Ok(Some(pergunta(id, 1))) }));
        mock.expect_respostas_for()
            .returning(|_| Box::pin(async { Ok(vec![]) }));
        mock.expect_delete_pergunta()
            .returning(|_, _, _| Box::pin(async { Ok(BTreeMap::from([(1, 5)])) }));

        let outcome = service(mock).delete_question(99, true, 10).await.unwrap();
        assert!(matches!(outcome, DeleteQuestionOutcome::Deleted { .. }));
    }

    // ----- vote tests -----

    #[tokio::test]
    async fn vote_rejects_invalid_value() {
        let outcome = service(MockCommunityRepository::new())
            .vote(1, 20, 3)
            .await
            .unwrap();
        assert_eq!(outcome, VoteOutcome::InvalidValue);
    }

    #[tokio::test]
    async fn vote_on_own_answer_is_refused() {
        let mut mock = MockCommunityRepository::new();
        mock.expect_find_resposta()
            .returning(|id| Box::pin(async move { Ok(Some(resposta(id, 10, 2))) }));

        let outcome = service(mock).vote(2, 20, 1).await.unwrap();
        assert_eq!(outcome, VoteOutcome::OwnAnswer);
    }
}
