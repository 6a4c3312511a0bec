//! ウォッチポイント管理
//!
//! 固定長のスロットに式を保持し、ポーリングのたびに再評価して
//! 値の変化を検出します。

use crate::errors::{ExprError, WatchpointError, WatchpointId};
use crate::expr_eval::ExprEngine;
use sdb_target::{MachineState, Word};
use tracing::{debug, warn};

/// ウォッチポイントプールの容量
pub const NR_WP: usize = 32;

/// ウォッチポイント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watchpoint {
    pub id: WatchpointId,
    pub expr: String,
    pub old_value: Word,
    pub new_value: Word,
    /// 直前のポーリングで評価に失敗したか
    pub failing: bool,
}

/// ポーリング結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchpointHit {
    pub id: WatchpointId,
    pub expr: String,
    pub old_value: Word,
    pub new_value: Word,
    pub changed: bool,
    /// 再評価に失敗した場合のエラー（値は前回のまま）
    pub error: Option<ExprError>,
    /// 成功から失敗に転じたポーリングか（このときだけ警告を出す）
    pub first_failure: bool,
}

/// ウォッチポイントプール
///
/// IDはスロット番号と一致し、空いている最小のスロットを割り当てます。
/// 削除されるまでIDは再利用されません。
pub struct WatchpointPool {
    slots: [Option<Watchpoint>; NR_WP],
}

impl WatchpointPool {
    /// 空のプールを作成する
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// プールの容量
    pub fn capacity(&self) -> usize {
        NR_WP
    }

    /// 使用中のウォッチポイント数
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// ウォッチポイントが一つもないか
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// ウォッチポイントを作成する
    ///
    /// スロットを確保してから式を評価し、初期値とします。
    /// 評価に失敗した場合はスロットを解放してエラーを返します。
    pub fn create(
        &mut self,
        expr: &str,
        engine: &ExprEngine,
        state: &dyn MachineState,
    ) -> Result<WatchpointId, WatchpointError> {
        let expr = expr.trim();
        let id = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(WatchpointError::PoolExhausted { capacity: NR_WP })?;

        self.slots[id] = Some(Watchpoint {
            id,
            expr: expr.to_string(),
            old_value: 0,
            new_value: 0,
            failing: false,
        });

        match engine.evaluate(expr, state) {
            Ok(value) => {
                if let Some(wp) = self.slots[id].as_mut() {
                    wp.old_value = value;
                    wp.new_value = value;
                }
                debug!("watchpoint {} created: {} = {}", id, expr, value);
                Ok(id)
            }
            Err(source) => {
                self.slots[id] = None;
                Err(WatchpointError::Eval {
                    expr: expr.to_string(),
                    source,
                })
            }
        }
    }

    /// ウォッチポイントを削除する
    pub fn delete(&mut self, id: WatchpointId) -> Result<Watchpoint, WatchpointError> {
        let wp = self
            .slots
            .get_mut(id)
            .and_then(Option::take)
            .ok_or(WatchpointError::NotFound(id))?;
        debug!("watchpoint {} deleted", id);
        Ok(wp)
    }

    /// ウォッチポイントを取得する
    pub fn get(&self, id: WatchpointId) -> Option<&Watchpoint> {
        self.slots.get(id)?.as_ref()
    }

    /// 使用中のウォッチポイントをID順に列挙する
    pub fn list(&self) -> impl Iterator<Item = &Watchpoint> {
        self.slots.iter().flatten()
    }

    /// すべてのウォッチポイントを再評価する
    ///
    /// 値が変化したものは `new_value` を `old_value` に移して更新します。
    /// 評価に失敗したウォッチポイントは削除せず、値も変えません。
    pub fn poll_all(&mut self, engine: &ExprEngine, state: &dyn MachineState) -> Vec<WatchpointHit> {
        self.slots
            .iter_mut()
            .flatten()
            .map(|wp| {
                let result = engine.evaluate(&wp.expr, state);
                let first_failure = result.is_err() && !wp.failing;
                wp.failing = result.is_err();

                let (changed, error) = match result {
                    Ok(value) if value != wp.new_value => {
                        wp.old_value = wp.new_value;
                        wp.new_value = value;
                        debug!(
                            "watchpoint {} triggered: {} {} -> {}",
                            wp.id, wp.expr, wp.old_value, wp.new_value
                        );
                        (true, None)
                    }
                    Ok(_) => (false, None),
                    Err(e) => {
                        if first_failure {
                            warn!("watchpoint {} ({}) evaluation failed: {}", wp.id, wp.expr, e);
                        } else {
                            debug!("watchpoint {} ({}) still failing: {}", wp.id, wp.expr, e);
                        }
                        (false, Some(e))
                    }
                };
                WatchpointHit {
                    id: wp.id,
                    expr: wp.expr.clone(),
                    old_value: wp.old_value,
                    new_value: wp.new_value,
                    changed,
                    error,
                    first_failure,
                }
            })
            .collect()
    }
}

impl Default for WatchpointPool {
    fn default() -> Self {
        Self::new()
    }
}
