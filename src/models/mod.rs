// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque entité correspond à une table gérée par SeaORM.
//
// Liste des modules:
//   - health : Health check API
//   - tours : Tours (nom unique, slug, notes agrégées, localisation)
//   - reviews : Avis d'un user sur un tour (1 seul par couple tour/user)
//   - users : Utilisateurs (rôles, mot de passe hashé, reset token)
//   - tour_guides : Liaison tours <-> guides
//   - dto : Payloads des requêtes + enveloppe de réponse
//
// Points d'attention:
//   - Aucune logique cachée dans les modèles (pas de hooks) : slug,
//     exclusion des tours secrets / users inactifs et recalcul des notes
//     sont des appels explicites dans services/
//
// ============================================================================

pub mod health;
pub mod tours;
pub mod reviews;
pub mod users;
pub mod tour_guides;
pub mod dto;
