use std::time::Duration;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_STUDENT: &str = "student";

pub const TIER_FULL: &str = "full";
pub const TIER_LIMITED: &str = "limited";

// ledger sources
pub const SOURCE_QUIZ: &str = "quiz";
pub const SOURCE_DESAFIO: &str = "desafio";
pub const SOURCE_PENALIDADE_DESAFIO: &str = "penalidade_desafio";
pub const SOURCE_COMUNIDADE: &str = "comunidade";
pub const SOURCE_FORMULARIO: &str = "formulario";
pub const SOURCE_BONUS: &str = "bonus";
pub const SOURCE_AJUSTE: &str = "ajuste";

// ledger kinds
pub const KIND_QUIZ_ATTEMPT: &str = "tentativa";
pub const KIND_DESAFIO_COMPLETO: &str = "completo";
pub const KIND_DESISTENCIA: &str = "desistencia";
pub const KIND_PERGUNTA: &str = "pergunta";
pub const KIND_RESPOSTA: &str = "resposta";
pub const KIND_RESPOSTA_CERTA: &str = "resposta_certa";
pub const KIND_FORMULARIO: &str = "preenchido";
pub const KIND_BONUS: &str = "bonus";
pub const KIND_SALDO_ZERADO: &str = "saldo_zerado";

pub const STATUS_PENDENTE: &str = "pendente";
pub const STATUS_APROVADO: &str = "aprovado";
pub const STATUS_REJEITADO: &str = "rejeitado";
pub const STATUS_DESISTIU: &str = "desistiu";

pub const NOTIFY_BONUS: &str = "bonus";
pub const NOTIFY_RESPOSTA_NOVA: &str = "resposta_nova";
pub const NOTIFY_RESPOSTA_ACEITA: &str = "resposta_aceita";
pub const NOTIFY_DESAFIO_APROVADO: &str = "desafio_aprovado";
pub const NOTIFY_DESAFIO_REJEITADO: &str = "desafio_rejeitado";

pub const LOCALE_COOKIE_NAME: &str = "lang";
pub const DEFAULT_LOCALE: &str = "pt-BR";

pub const DEFAULT_RANKING_LIMIT: i64 = 10;
pub const MAX_RANKING_LIMIT: i64 = 100;
pub const DEFAULT_CHAMPIONS_LIMIT: usize = 12;
pub const MAX_CHAMPIONS_LIMIT: usize = 120;
pub const HISTORY_LIMIT: i64 = 100;
pub const NOTIFICATIONS_LIMIT: i64 = 50;

pub const DEFAULT_QUIZ_MAX_XP: i64 = 20;
pub const DEFAULT_QUIZ_QUESTIONS: usize = 5;
pub const MAX_QUIZ_QUESTIONS: usize = 20;

pub const GENERATOR_TIMEOUT: Duration = Duration::from_secs(55);
