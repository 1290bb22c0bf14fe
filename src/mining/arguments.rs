//! 引擎参数构造

use super::MinerConnectionConfig;

const STRATUM_SERVER_ADDRESS_FLAG: &str = "--stratum_server_address";
const STRATUM_SERVER_USERNAME_FLAG: &str = "--stratum_server_username";
const STRATUM_SERVER_PASSWORD_FLAG: &str = "--stratum_server_password";

const MASK: &str = "******";

/// 构造传给引擎的参数列表
///
/// 顺序固定：进程名、地址、用户名、密码、修剪模式。未设置的字段不出现。
pub fn build_arguments(process_name: &str, config: &MinerConnectionConfig) -> Vec<String> {
    let mut arguments = vec![process_name.to_string()];

    let optional = [
        (STRATUM_SERVER_ADDRESS_FLAG, &config.stratum_server_address),
        (STRATUM_SERVER_USERNAME_FLAG, &config.username),
        (STRATUM_SERVER_PASSWORD_FLAG, &config.password),
    ];

    for (flag, value) in optional {
        if let Some(value) = value {
            arguments.push(flag.to_string());
            arguments.push(value.clone());
        }
    }

    arguments.push(config.trimming_mode.flag().to_string());
    arguments
}

/// 日志用的参数列表，密码被遮盖
///
/// 按 `build_arguments` 的结构解析：跳过进程名，带值的标志连同其值一起消费。
pub fn masked_arguments(arguments: &[String]) -> Vec<String> {
    let mut masked = arguments.to_vec();
    let mut index = 1;
    while index < masked.len() {
        let flag = masked[index].as_str();
        let takes_value = flag == STRATUM_SERVER_ADDRESS_FLAG
            || flag == STRATUM_SERVER_USERNAME_FLAG
            || flag == STRATUM_SERVER_PASSWORD_FLAG;

        if !takes_value {
            index += 1;
            continue;
        }

        if flag == STRATUM_SERVER_PASSWORD_FLAG {
            if let Some(value) = masked.get_mut(index + 1) {
                *value = MASK.to_string();
            }
        }
        index += 2;
    }
    masked
}
