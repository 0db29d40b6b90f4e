use crate::{
    Action, Amount, BalanceRecord, ExecutionPlan, Host, LedgerConfig, Mutation, Notice,
    SupplyRecord, Symbol, TokenError, TokenStore, supply::validate_new_supply,
};
use metrics::{counter, histogram};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// A validated call: the mutations to apply and who to tell once they are.
#[derive(Default)]
struct Planned {
    plan: ExecutionPlan,
    notices: Vec<(Uuid, Notice)>,
}

impl Planned {
    fn notify(&mut self, recipient: Uuid, notice: Notice) {
        self.notices.push((recipient, notice));
    }
}

/// The operation layer over a [`TokenStore`].
///
/// Every public operation runs its preconditions against the store, builds
/// one [`ExecutionPlan`] and submits it. Nothing is written unless the whole
/// plan applies. The store repeats the balance and supply guards inside its
/// own lock, so the reads here are an early rejection, not the last word.
#[derive(Clone)]
pub struct TokenLedger {
    config: LedgerConfig,
    store: Arc<dyn TokenStore>,
    host: Host,
}

impl TokenLedger {
    pub fn new(config: LedgerConfig, store: Arc<dyn TokenStore>) -> Self {
        Self::with_host(config, store, Host::default())
    }

    pub fn with_host(config: LedgerConfig, store: Arc<dyn TokenStore>, host: Host) -> Self {
        Self {
            config,
            store,
            host,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn TokenStore {
        self.store.as_ref()
    }

    // ==================== Operations ====================

    /// Register a new symbol with `max_supply` as its cap. Requires the
    /// ledger authority.
    pub async fn create(
        &self,
        caller: Uuid,
        issuer: Uuid,
        max_supply: Amount,
    ) -> Result<SupplyRecord, TokenError> {
        let planned = self.plan_create(caller, issuer, &max_supply).await;
        self.commit(Action::Create, &max_supply, planned).await?;
        self.store.find_supply(max_supply.code()).await
    }

    /// Mint `quantity` to the issuer and, when `to` is someone else, move it
    /// on with a full transfer inside the same plan.
    pub async fn issue(
        &self,
        caller: Uuid,
        to: Uuid,
        quantity: Amount,
        memo: &str,
        allow_auto_create_destination: bool,
    ) -> Result<(), TokenError> {
        let mut planned = Planned::default();
        let result = self
            .plan_issue(
                &mut planned,
                caller,
                to,
                &quantity,
                memo,
                allow_auto_create_destination,
            )
            .await
            .map(|_| planned);
        self.commit(Action::Issue, &quantity, result).await
    }

    /// Open a zero balance for `owner`. Only a zero quantity is accepted.
    pub async fn signup(
        &self,
        caller: Uuid,
        owner: Uuid,
        quantity: Amount,
    ) -> Result<(), TokenError> {
        let planned = self.plan_signup(caller, owner, &quantity).await;
        self.commit(Action::Signup, &quantity, planned).await
    }

    pub async fn burn(
        &self,
        caller: Uuid,
        from: Uuid,
        quantity: Amount,
        memo: &str,
    ) -> Result<(), TokenError> {
        let planned = self.plan_burn(caller, from, &quantity, memo).await;
        self.commit(Action::Burn, &quantity, planned).await
    }

    pub async fn transfer(
        &self,
        caller: Uuid,
        from: Uuid,
        to: Uuid,
        quantity: Amount,
        memo: &str,
        allow_auto_create_destination: bool,
    ) -> Result<(), TokenError> {
        let mut planned = Planned::default();
        let result = self
            .plan_transfer(
                &mut planned,
                caller,
                from,
                to,
                &quantity,
                memo,
                allow_auto_create_destination,
            )
            .await
            .map(|_| planned);
        self.commit(Action::Transfer, &quantity, result).await
    }

    // ==================== Queries ====================

    pub async fn supply(&self, code: &str) -> Result<SupplyRecord, TokenError> {
        self.store.find_supply(code).await
    }

    /// Balance of `owner`, zero when no record exists for a registered symbol.
    pub async fn balance(&self, owner: Uuid, code: &str) -> Result<Amount, TokenError> {
        let record = self.store.find_supply(code).await?;
        let balance = self.store.find_balance(owner, code).await?;
        Ok(balance
            .map(|b| b.balance)
            .unwrap_or_else(|| Amount::zero(record.symbol)))
    }

    pub async fn holders(&self, code: &str) -> Result<Vec<BalanceRecord>, TokenError> {
        self.store.find_supply(code).await?;
        self.store.balances(code).await
    }

    pub async fn symbols(&self) -> Result<Vec<SupplyRecord>, TokenError> {
        self.store.symbols().await
    }

    // ==================== Planning ====================

    async fn plan_create(
        &self,
        caller: Uuid,
        issuer: Uuid,
        max_supply: &Amount,
    ) -> Result<Planned, TokenError> {
        self.require_auth(caller, self.config.authority)?;
        validate_new_supply(max_supply)?;

        match self.store.find_supply(max_supply.code()).await {
            Ok(_) => {
                return Err(TokenError::AlreadyExists(format!(
                    "token with symbol {} already exists",
                    max_supply.code()
                )));
            }
            Err(TokenError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let mut planned = Planned::default();
        planned.plan.add(Mutation::CreateSupply {
            issuer,
            max_supply: max_supply.clone(),
        });
        Ok(planned)
    }

    async fn plan_issue(
        &self,
        planned: &mut Planned,
        caller: Uuid,
        to: Uuid,
        quantity: &Amount,
        memo: &str,
        allow_auto_create_destination: bool,
    ) -> Result<(), TokenError> {
        check_symbol(&quantity.symbol)?;
        let record = self.store.find_supply(quantity.code()).await?;

        check_quantity(quantity, &record)?;
        if quantity.value < 0 {
            return Err(TokenError::InvalidAmount(
                "must issue positive quantity or zero".to_string(),
            ));
        }
        self.check_memo(memo)?;
        self.require_auth(caller, record.issuer)?;
        if quantity.value > record.headroom() {
            return Err(TokenError::SupplyExceeded);
        }

        planned.plan.add(Mutation::AdjustSupply {
            code: record.code().to_string(),
            delta: quantity.clone(),
        });
        planned.plan.add(Mutation::Credit {
            owner: record.issuer,
            amount: quantity.clone(),
            allow_create: true,
        });
        planned.notify(
            record.issuer,
            Notice {
                action: Action::Issue,
                from: None,
                to: Some(record.issuer),
                quantity: quantity.clone(),
                memo: memo.to_string(),
            },
        );

        if to != record.issuer {
            self.plan_transfer(
                planned,
                caller,
                record.issuer,
                to,
                quantity,
                memo,
                allow_auto_create_destination,
            )
            .await?;
        }

        Ok(())
    }

    async fn plan_signup(
        &self,
        caller: Uuid,
        owner: Uuid,
        quantity: &Amount,
    ) -> Result<Planned, TokenError> {
        check_symbol(&quantity.symbol)?;
        let record = self.store.find_supply(quantity.code()).await?;
        self.require_auth(caller, owner)?;

        check_quantity(quantity, &record)?;
        if quantity.value != 0 {
            return Err(TokenError::InvalidAmount(
                "quantity exceeds signup allowance".to_string(),
            ));
        }
        if self
            .store
            .find_balance(owner, quantity.code())
            .await?
            .is_some()
        {
            return Err(TokenError::AlreadyExists(
                "you have already signed up".to_string(),
            ));
        }
        // Always passes for a zero quantity.
        if quantity.value > record.headroom() {
            return Err(TokenError::SupplyExceeded);
        }

        let mut planned = Planned::default();
        planned.plan.add(Mutation::AdjustSupply {
            code: record.code().to_string(),
            delta: quantity.clone(),
        });
        planned.plan.add(Mutation::Open {
            owner,
            symbol: record.symbol.clone(),
        });
        planned.notify(
            owner,
            Notice {
                action: Action::Signup,
                from: None,
                to: Some(owner),
                quantity: quantity.clone(),
                memo: String::new(),
            },
        );
        Ok(planned)
    }

    async fn plan_burn(
        &self,
        caller: Uuid,
        from: Uuid,
        quantity: &Amount,
        memo: &str,
    ) -> Result<Planned, TokenError> {
        check_symbol(&quantity.symbol)?;
        self.check_memo(memo)?;
        let record = self.store.find_supply(quantity.code()).await?;
        self.require_auth(caller, from)?;

        check_quantity(quantity, &record)?;
        if quantity.value < 0 {
            return Err(TokenError::InvalidAmount(
                "must burn positive or zero quantity".to_string(),
            ));
        }
        if quantity.value > record.supply.value {
            return Err(TokenError::SupplyExceeded);
        }

        let mut planned = Planned::default();
        planned.plan.add(Mutation::AdjustSupply {
            code: record.code().to_string(),
            delta: Amount::new(-quantity.value, quantity.symbol.clone()),
        });
        planned.plan.add(Mutation::Debit {
            owner: from,
            amount: quantity.clone(),
        });
        planned.notify(
            from,
            Notice {
                action: Action::Burn,
                from: Some(from),
                to: None,
                quantity: quantity.clone(),
                memo: memo.to_string(),
            },
        );
        Ok(planned)
    }

    #[allow(clippy::too_many_arguments)]
    async fn plan_transfer(
        &self,
        planned: &mut Planned,
        caller: Uuid,
        from: Uuid,
        to: Uuid,
        quantity: &Amount,
        memo: &str,
        allow_auto_create_destination: bool,
    ) -> Result<(), TokenError> {
        if from == to {
            return Err(TokenError::SelfTransfer);
        }
        self.require_auth(caller, from)?;
        if !self.host.directory.exists(to) {
            return Err(TokenError::UnknownAccount(to));
        }

        let record = self.store.find_supply(quantity.code()).await?;
        check_quantity(quantity, &record)?;
        if quantity.value <= 0 {
            return Err(TokenError::InvalidAmount(
                "must transfer positive quantity".to_string(),
            ));
        }
        self.check_memo(memo)?;

        // Debit first: the source is never credited before it is drawn down.
        planned.plan.add(Mutation::Debit {
            owner: from,
            amount: quantity.clone(),
        });
        planned.plan.add(Mutation::Credit {
            owner: to,
            amount: quantity.clone(),
            allow_create: allow_auto_create_destination,
        });

        let notice = Notice {
            action: Action::Transfer,
            from: Some(from),
            to: Some(to),
            quantity: quantity.clone(),
            memo: memo.to_string(),
        };
        planned.notify(from, notice.clone());
        planned.notify(to, notice);
        Ok(())
    }

    // ==================== Execution ====================

    async fn commit(
        &self,
        action: Action,
        quantity: &Amount,
        planned: Result<Planned, TokenError>,
    ) -> Result<(), TokenError> {
        let result = match planned {
            Ok(planned) => self
                .store
                .execute_plan(&planned.plan)
                .await
                .map(|_| planned.notices),
            Err(e) => Err(e),
        };

        counter!("token.operations.total",
            "op" => action.as_str(),
            "status" => if result.is_ok() { "success" } else { "failed" }
        )
        .increment(1);

        match result {
            Ok(notices) => {
                histogram!("token.operation.amount", "symbol" => quantity.code().to_string())
                    .record(quantity.to_display());
                info!(op = %action, quantity = %quantity, "token operation committed");

                for (recipient, notice) in &notices {
                    self.host.notifier.notify(*recipient, notice);
                }
                Ok(())
            }
            Err(e) => {
                warn!(op = %action, symbol = %quantity.symbol, error = %e, "token operation rejected");
                Err(e)
            }
        }
    }

    fn require_auth(&self, caller: Uuid, account: Uuid) -> Result<(), TokenError> {
        if self.host.authorizer.is_authorized(caller, account) {
            Ok(())
        } else {
            Err(TokenError::Unauthorized(account))
        }
    }

    fn check_memo(&self, memo: &str) -> Result<(), TokenError> {
        if memo.len() > self.config.max_memo_bytes {
            return Err(TokenError::MemoTooLong(memo.len()));
        }
        Ok(())
    }
}

fn check_symbol(symbol: &Symbol) -> Result<(), TokenError> {
    if !symbol.is_valid() {
        return Err(TokenError::InvalidSymbol(symbol.to_string()));
    }
    Ok(())
}

fn check_quantity(quantity: &Amount, record: &SupplyRecord) -> Result<(), TokenError> {
    if !quantity.is_valid() {
        return Err(TokenError::InvalidAmount("invalid quantity".to_string()));
    }
    if quantity.symbol != record.symbol {
        return Err(TokenError::InvalidAmount(
            "symbol precision mismatch".to_string(),
        ));
    }
    Ok(())
}
