//! # SuriSearch — mots-clés et suggestions de recherche
//!
//! Décide si le texte tapé dans la barre d'URL désigne un mot-clé de
//! marque-page ou l'alias d'un moteur de recherche, le transforme en requête
//! navigable, et produit des complétions qui arrivent au fil de l'eau.
//!
//! ## Architecture des modules
//!
//! - [`keywords`] : vue en lecture seule sur les marque-pages à mot-clé
//!   (snapshot rafraîchi explicitement).
//!
//! - [`engines`] : registre des moteurs installés et normalisation des alias
//!   (`^[a-z0-9_-]+$`, uniques, suffixes numériques en cas de collision).
//!
//! - [`resolver`] : `texte → URL (+ POST)`, substitution `%s`/`%S` et gestion
//!   du charset (`&mozcharset=`, historique, repli UTF-8).
//!
//! - [`context`] : arbre de contextes de complétion, `fork` et agrégation.
//!
//! - [`suggest`] : requêtes de suggestions JSON en parallèle sur la boucle
//!   tokio, une par moteur, annulables.
//!
//! - [`completion`] : complétion « search » et session qui applique les
//!   résultats au fur et à mesure.
//!
//! - [`history`] : recherche rapide d'un mot-clé dans l'historique.
//!
//! - [`codec`], [`http`], [`config`], [`error`] : encodage, client reqwest,
//!   configuration TOML, types d'erreurs.
//!
//! - [`dispatcher`] : point d'entrée qui assemble le tout.

pub mod codec;
pub mod completion;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod engines;
pub mod error;
pub mod history;
pub mod http;
pub mod keywords;
pub mod resolver;
pub mod suggest;

pub use completion::{CompleterKind, CompletionOptions, CompletionSession};
pub use context::{CompletionContext, Item, Sort};
pub use dispatcher::{Collaborators, DispatchSettings, SearchDispatcher};
pub use resolver::ResolvedTarget;
pub use suggest::Suggestion;
