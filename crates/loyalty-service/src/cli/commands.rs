//! CLI 命令定义
//!
//! 使用 clap derive 宏定义命令行接口结构。

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// 积分服务命令行工具
#[derive(Parser, Debug)]
#[command(name = "loyalty")]
#[command(version, about = "门店积分兑换与累计工具")]
#[command(propagate_version = true)]
pub struct Cli {
    /// 日志级别，覆盖配置文件中的 observability.log_level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// 使用进程内存储，不连接数据库
    #[arg(long)]
    pub in_memory: bool,

    /// 进程内存储启动时加载的数据文件（JSON）
    #[arg(long, requires = "in_memory")]
    pub data: Option<PathBuf>,

    /// 命令执行后输出 Prometheus 指标快照
    #[arg(long)]
    pub print_metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// 子命令枚举
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 检查购物篮能否兑换积分（只读）
    Check {
        /// 购物篮 ID
        basket_id: String,
    },

    /// 用积分抵扣购物篮金额
    Redeem {
        /// 购物篮 ID
        basket_id: String,

        /// 兑换积分，必须是门店允许的档位
        points: i64,
    },

    /// 结单并累计积分
    Complete {
        /// 购物篮 ID
        basket_id: String,
    },

    /// 查询顾客积分流水
    Ledger {
        /// 顾客 ID
        customer_id: i64,
    },

    /// 按手机号查询顾客积分概览
    Customer {
        /// 手机号
        phone: String,
    },

    /// 查询购物篮
    Basket {
        /// 购物篮 ID
        basket_id: String,
    },

    /// 执行数据库迁移
    Migrate,

    /// 导入门店、顾客、购物篮数据
    Seed {
        /// 数据文件路径（JSON）
        file: PathBuf,
    },
}
