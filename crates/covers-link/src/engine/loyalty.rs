//! Loyalty: members, rewards and redemptions.
//!
//! Points and rewards are only redeemed against an order the platform has
//! just accepted from `update_order`, so a redemption never points at an
//! order the platform does not know.

use covers_core::{validation::validate_points_redeem, Member, Order, PointsRedeem, Reward};
use tracing::info;

use super::ReconciliationEngine;
use crate::api::client::required;
use crate::error::LinkResult;
use crate::protocol::EventKind;

impl ReconciliationEngine {
    // =========================================================================
    // Push Handling
    // =========================================================================

    /// Forwards `member_created` / `member_updated` to the reward manager.
    pub async fn handle_member_event(&self, kind: EventKind, member_id: &str) -> LinkResult<()> {
        let member = self.api.get_member(member_id).await?;
        let rewards = self.managers.rewards()?;
        match kind {
            EventKind::MemberCreated => rewards.member_created(&member).await?,
            _ => rewards.member_updated(&member).await?,
        }
        Ok(())
    }

    // =========================================================================
    // Members
    // =========================================================================

    pub async fn get_member(&self, member_id: &str) -> LinkResult<Member> {
        self.api.get_member(member_id).await
    }

    pub async fn create_member(&self, member: &Member) -> LinkResult<Member> {
        self.api.create_member(member).await
    }

    pub async fn update_member(&self, member: &Member) -> LinkResult<Member> {
        self.api.update_member(member).await
    }

    pub async fn delete_member(&self, member_id: &str) -> LinkResult<()> {
        self.api.delete_member(member_id).await
    }

    pub async fn rewards_for_member(&self, member_id: &str) -> LinkResult<Vec<Reward>> {
        self.api.get_rewards(member_id).await
    }

    // =========================================================================
    // Redemption
    // =========================================================================

    /// Writes the order, then spends `points` against it.
    pub async fn redeem_points_for_order(
        &self,
        order: &Order,
        member_id: &str,
        points: i64,
    ) -> LinkResult<Member> {
        let written = self.update_order(order).await?;
        let redeem = PointsRedeem {
            order_id: required("order.id", written.id.as_deref())?.to_string(),
            points,
            reward_id: None,
        };
        validate_points_redeem(&redeem)?;

        let member = self.api.redeem_points(member_id, &redeem).await?;
        info!(member_id = %member_id, order_id = %redeem.order_id, points, "Points redeemed");
        Ok(member)
    }

    /// Writes the order, then redeems `reward_id` against it.
    pub async fn redeem_reward_for_member(
        &self,
        order: &Order,
        member_id: &str,
        reward_id: &str,
    ) -> LinkResult<Member> {
        let written = self.update_order(order).await?;
        let order_id = required("order.id", written.id.as_deref())?;

        let member = self.api.redeem_reward(member_id, reward_id, order_id).await?;
        info!(member_id = %member_id, order_id = %order_id, reward_id = %reward_id, "Reward redeemed");
        Ok(member)
    }
}
