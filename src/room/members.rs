use std::collections::HashMap;

use super::{models::MembershipModel, types::MemberResponse};
use crate::account::repository::AccountRepository;
use crate::shared::AppError;

/// Joins one membership with its account
pub async fn describe_member(
    accounts: &(dyn AccountRepository + Send + Sync),
    membership: &MembershipModel,
) -> Result<MemberResponse, AppError> {
    let account = accounts.get_account(&membership.account_id).await?;
    Ok(MemberResponse::new(membership, account.as_ref()))
}

/// Joins memberships with their accounts, keeping the membership order
pub async fn describe_members(
    accounts: &(dyn AccountRepository + Send + Sync),
    memberships: &[MembershipModel],
) -> Result<Vec<MemberResponse>, AppError> {
    let ids: Vec<String> = memberships.iter().map(|m| m.account_id.clone()).collect();
    let by_id: HashMap<String, _> = accounts
        .get_accounts(&ids)
        .await?
        .into_iter()
        .map(|account| (account.id.clone(), account))
        .collect();

    Ok(memberships
        .iter()
        .map(|m| MemberResponse::new(m, by_id.get(&m.account_id)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{models::AccountModel, repository::InMemoryAccountRepository};

    #[tokio::test]
    async fn test_members_are_joined_with_accounts_in_order() {
        let accounts = InMemoryAccountRepository::new();
        let ada = AccountModel::new("ada".to_string(), "Ada L.".to_string(), None, None);
        let bob = AccountModel::new("bob".to_string(), "Bob".to_string(), None, None);
        accounts.create_account(&ada).await.unwrap();
        accounts.create_account(&bob).await.unwrap();

        let memberships = vec![
            MembershipModel::owner(bob.id.clone(), "room".to_string()),
            MembershipModel::listener(ada.id.clone(), "room".to_string()),
        ];

        let members = describe_members(&accounts, &memberships).await.unwrap();
        assert_eq!(members[0].username, "bob");
        assert!(members[0].is_moderator);
        assert_eq!(members[1].display_name, "Ada L.");

        let single = describe_member(&accounts, &memberships[1]).await.unwrap();
        assert_eq!(single, members[1]);
    }
}
